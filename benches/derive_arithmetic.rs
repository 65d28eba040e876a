use criterion::{black_box, criterion_group, criterion_main, Criterion};

use pwd::{load_grammar, Engine};

const GRAMMAR_SRC: &str = r#"
%tokens
NUM = "[0-9]+"
%start
<expr>

<expr> ::= <expr> "+" <term> | <term>
<term> ::= <term> "*" <factor> | <factor>
<factor> ::= NUM | "(" <expr> ")"
"#;

fn parse(engine: &Engine<String>, g: &pwd::Grammar<String>, input: &[String]) -> usize {
  engine.parse_compact(input, g).len()
}

fn criterion_benchmark(c: &mut Criterion) {
  let loaded = load_grammar(GRAMMAR_SRC).unwrap();
  let g = loaded.top();

  let short: Vec<String> = "1 + 2 * 3".split(' ').map(String::from).collect();
  let nested: Vec<String> = "( 1 + 2 ) * ( 3 + 4 ) * 5"
    .split(' ')
    .map(String::from)
    .collect();

  c.bench_function("parse_compact short expression", |b| {
    b.iter(|| {
      // fresh Engine per iteration: this measures cold derivation, not a
      // warm-cache repeat parse.
      let engine = Engine::new();
      parse(&engine, black_box(&g), black_box(&short))
    })
  });

  c.bench_function("parse_compact nested parens", |b| {
    b.iter(|| {
      let engine = Engine::new();
      parse(&engine, black_box(&g), black_box(&nested))
    })
  });

  c.bench_function("parse_compact warm cache repeat", |b| {
    let engine = Engine::new();
    b.iter(|| parse(&engine, black_box(&g), black_box(&nested)))
  });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
