use mcstat::{ProbeMethod, Status};

fn main() {
    let mut status = Status::new("www.example.com", 25565);

    match status.probe(ProbeMethod::FullQuery) {
        Some(stats) => println!("{}", stats),
        None => eprintln!(
            "query failed: {}",
            status.last_error().unwrap_or("unknown error")
        ),
    }
}
