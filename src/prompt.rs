use std::io::{self, Write};

use tokio::task;

/*
    Line-oriented operator input. Every reader returns None when the
    operator types "exit" (or stdin hits EOF), and reprompts on anything it
    cannot parse. Reads run on the blocking pool so the cluster keeps
    making progress while the prompt waits.
*/

pub async fn read_string(label: &str) -> io::Result<Option<String>> {
    let label = label.to_string();
    task::spawn_blocking(move || {
        let mut stdout = io::stdout();
        write!(stdout, "{} ", label)?;
        stdout.flush()?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let line = line.trim().to_string();
        if line == "exit" {
            Ok(None)
        } else {
            Ok(Some(line))
        }
    })
    .await
    .map_err(io::Error::other)?
}

pub async fn read_usize(label: &str) -> io::Result<Option<usize>> {
    loop {
        let Some(text) = read_string(label).await? else {
            return Ok(None);
        };
        match text.parse() {
            Ok(value) => return Ok(Some(value)),
            Err(_) => eprintln!("could not parse {:?} as a number", text),
        }
    }
}

pub async fn read_bool(label: &str) -> io::Result<Option<bool>> {
    loop {
        let Some(text) = read_string(label).await? else {
            return Ok(None);
        };
        match text.parse() {
            Ok(value) => return Ok(Some(value)),
            Err(_) => eprintln!("could not parse {:?} as true or false", text),
        }
    }
}
