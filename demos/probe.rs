use mcstat::{Conf, McstatError};

fn main() -> Result<(), McstatError> {
    let server = Conf::create("www.example.com");

    println!("{}", server.modern_ping()?);

    Ok(())
}
