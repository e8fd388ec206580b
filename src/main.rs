use clap::Parser;
use marsh::ast::printer;
use marsh::parse_with_path;
use std::io::Read;

#[derive(Parser)]
#[command(name = "marsh")]
#[command(about = "A POSIX shell front end: parse, check, and reprint shell source")]
#[command(version)]
struct Cli {
    /// Parse the script from a command line argument
    #[arg(short = 'c')]
    script: Option<String>,

    /// Only check the syntax; print nothing on success
    #[arg(short = 'n', long = "check")]
    check: bool,

    /// Print the canonical form instead of the original bytes
    #[arg(long = "canonical")]
    canonical: bool,

    /// Output the result as JSON (ok, error, exitCode)
    #[arg(long = "json")]
    json: bool,

    /// Script file to parse
    #[arg()]
    script_file: Option<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let (source, path) = if let Some(s) = cli.script {
        (s, "<command line>".to_string())
    } else if let Some(ref file) = cli.script_file {
        match std::fs::read_to_string(file) {
            Ok(content) => (content, file.clone()),
            Err(e) => {
                eprintln!("marsh: cannot read {}: {}", file, e);
                std::process::exit(1);
            }
        }
    } else {
        use std::io::IsTerminal;
        if std::io::stdin().is_terminal() {
            eprintln!("marsh: no script given; use -c 'script', a file, or pipe via stdin");
            std::process::exit(1);
        }
        let mut buf = String::new();
        if let Err(e) = std::io::stdin().read_to_string(&mut buf) {
            eprintln!("marsh: cannot read stdin: {}", e);
            std::process::exit(1);
        }
        (buf, "<stdin>".to_string())
    };

    match parse_with_path(&source, &path) {
        Ok(program) => {
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({"ok": true, "error": null, "exitCode": 0})
                );
            } else if !cli.check {
                let text = if cli.canonical {
                    printer::canonical(&program.root)
                } else {
                    printer::verbatim(&program.arena)
                };
                print!("{}", text);
            }
            std::process::exit(0);
        }
        Err(err) => {
            let status = err.exit_status();
            let arena = marsh::Arena::from_source(&path, &source);
            let diagnostic = arena.format_diagnostic(err.span(), &err.to_string());
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({"ok": false, "error": diagnostic, "exitCode": status})
                );
            } else {
                eprintln!("{}", diagnostic);
            }
            std::process::exit(status);
        }
    }
}
