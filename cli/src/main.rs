use std::env;
use std::fs;
use std::io;
use std::io::Write;
use std::process;

use pwd::{Engine, Err, Tree};

fn usage(prog_name: &str) -> String {
  format!(
    r"
Usage: {} FILE [options]

Options:
  -h, --help    Print this message
  -c, --chart   Print each residual grammar as it's derived (defaults to not printing)",
    prog_name
  )
}

fn parse_and_report(engine: &Engine<String>, g: &pwd::Grammar<String>, line: &str, print_chart: bool) {
  let tokens: Vec<String> = line.split_whitespace().map(String::from).collect();

  if print_chart {
    for (i, step) in engine.trace_compact(&tokens, g).into_iter().enumerate() {
      println!("step {i}: nullable={}", engine.is_nullable(&step));
    }
  }

  let trees: Vec<Tree<String>> = engine.parse_compact(&tokens, g);
  println!(
    "Parsed {} tree{}",
    trees.len(),
    if trees.len() == 1 { "" } else { "s" }
  );
  for t in &trees {
    println!("{}", t);
  }
  println!();
}

fn main() -> Result<(), Err> {
  tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .init();

  let opts: Vec<String> = env::args().collect();
  let prog_name = opts[0].clone();

  if opts.len() < 2 {
    println!("{}", usage(&prog_name));
    process::exit(1);
  }

  let mut opts = opts.into_iter().skip(1);
  let filename = opts.next().unwrap();

  let mut print_chart = false;
  for o in opts {
    if o == "-h" || o == "--help" {
      println!("{}", usage(&prog_name));
      process::exit(0);
    } else if o == "-c" || o == "--chart" {
      print_chart = true;
    }
  }

  let source = fs::read_to_string(&filename)?;
  let loaded = pwd::load_grammar(&source)?;
  let g = loaded.top();
  let engine: Engine<String> = Engine::new();

  let mut input = String::new();
  loop {
    print!("> ");
    io::stdout().flush()?;

    match io::stdin().read_line(&mut input) {
      Ok(0) => return Ok(()),
      Ok(_) => {
        parse_and_report(&engine, &g, input.trim(), print_chart);
        input.clear();
      }
      Err(error) => return Err(error.into()),
    }
  }
}
