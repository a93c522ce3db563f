use iosock::cli::CLI;

pub fn main() {
	CLI::execute();
}
