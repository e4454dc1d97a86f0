//! Load an image file on the host, print its layout and exports, and
//! resolve the well-known entry symbol.

use sharedcrypto_host::loader::HostImage;
use sharedcrypto_common::protocol::ENTRY_SYMBOL;
use std::process::ExitCode;

fn main() -> ExitCode {
    sharedcrypto_host::init_stderr_console();

    let Some(path) = std::env::args().nth(1) else {
        eprintln!("usage: sharedcrypto-host <image-file>");
        return ExitCode::FAILURE;
    };

    let bytes = match std::fs::read(&path) {
        Ok(bytes) => bytes,
        Err(err) => {
            eprintln!("[x] Cannot read {}: {}", path, err);
            return ExitCode::FAILURE;
        }
    };

    let image = match HostImage::load(&bytes) {
        Ok(image) => image,
        Err(err) => {
            eprintln!("[x] Load failed: {}", err);
            return ExitCode::FAILURE;
        }
    };

    println!(
        "[o] Loaded {} at 0x{:x} ({} bytes)",
        path,
        image.base(),
        image.size()
    );
    image.log_contents(&bytes);

    match image.find_export(ENTRY_SYMBOL) {
        Ok(address) => {
            println!("[o] {} resolved at 0x{:x}", ENTRY_SYMBOL, address);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("[x] {} not resolved: {}", ENTRY_SYMBOL, err);
            ExitCode::FAILURE
        }
    }
}
