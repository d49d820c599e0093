use mongr8_commands::{EmptyProvider, execute_from_command_line};

#[tokio::main]
async fn main() {
	if let Err(e) = execute_from_command_line::<EmptyProvider>().await {
		eprintln!("Error: {}", e);
		std::process::exit(1);
	}
}
