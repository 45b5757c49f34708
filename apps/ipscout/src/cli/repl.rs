//! Interactive loop over stdin. End of input behaves like `exit`.

use colored::Colorize;
use ipscout_core::{Control, ReconError, Shell};
use std::io::{self, BufRead, IsTerminal, Write};

/// Read commands until `exit`, `quit` or end of input.
pub fn run_repl(shell: &mut Shell) -> Result<(), ReconError> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let stdout = io::stdout();
    let colour = stdout.is_terminal();

    println!("Type 'help' for commands. Type 'exit' to quit.\n");

    loop {
        let prompt = shell.prompt();
        {
            let mut out = stdout.lock();
            if colour {
                write!(out, "{}", prompt.cyan().bold())?;
            } else {
                write!(out, "{prompt}")?;
            }
            out.flush()?;
        }

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            let mut out = stdout.lock();
            writeln!(out)?;
            shell.execute("EOF", &mut out)?;
            break;
        }

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut out = stdout.lock();
        if let Control::Exit = shell.execute(line, &mut out)? {
            break;
        }
    }
    Ok(())
}
