use std::io::Write;
use std::time::Duration;

use cucumber_eclipse_formatter::{MessageEndpoint, ReceivedFrame};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let endpoint = MessageEndpoint::bind()?.with_accept_timeout(Duration::from_secs(30));
    let addr = endpoint.local_addr();
    println!("listening on {addr}");
    std::io::stdout().flush()?;

    let handle = endpoint.start();
    let mut stdout = std::io::stdout();
    for frame in handle.join()? {
        match frame {
            ReceivedFrame::Message { envelope, .. } => {
                writeln!(stdout, "{}", serde_json::to_string(&envelope)?)?;
            }
            ReceivedFrame::Terminate => writeln!(stdout, "terminated")?,
        }
    }
    stdout.flush()?;
    Ok(())
}
