use std::fs;
use std::process::exit;

use bpaf::Bpaf;
use qarg_synth::draw::draw;
use qarg_synth::trace::{Instruction, QuditInfo, Trace};

#[derive(Debug, Clone, Bpaf)]
#[bpaf(options)]
struct Args {
    /// Minimum number of wires to draw, even when idle
    #[bpaf(short('q'), long("qudits"), fallback(0usize))]
    qudits: usize,

    /// Path to a trace file, one `gate[(params)] targets [| controls]` per line
    #[bpaf(positional)]
    trace_path: String,
}

fn main() {
    // Initialize logging
    env_logger::init();

    let args = args().run();

    let text = fs::read_to_string(&args.trace_path).expect("Failed to read trace file");
    let mut trace = Trace::new();
    for (lineno, raw) in text.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        match parse_instruction(line) {
            Ok(instruction) => trace.push(instruction),
            Err(err) => {
                eprintln!("{}:{}: {err}", args.trace_path, lineno + 1);
                exit(1);
            }
        }
    }
    trace.ensure_num_qudits(args.qudits);

    print!("{}", draw(&trace));
}

fn parse_instruction(line: &str) -> Result<Instruction, String> {
    let (head, tail) = match line.split_once('|') {
        Some((head, tail)) => (head, tail),
        None => (line, ""),
    };
    let mut tokens = head.split_whitespace();
    let gate = tokens.next().ok_or("missing gate name")?;
    let (name, params) = match gate.split_once('(') {
        Some((name, rest)) => {
            let rest = rest
                .strip_suffix(')')
                .ok_or_else(|| format!("unterminated parameter list in `{gate}`"))?;
            let params = rest
                .split(',')
                .filter(|part| !part.trim().is_empty())
                .map(|part| {
                    part.trim()
                        .parse::<f64>()
                        .map_err(|e| format!("bad parameter `{part}`: {e}"))
                })
                .collect::<Result<Vec<_>, _>>()?;
            (name, params)
        }
        None => (gate, Vec::new()),
    };
    let targets = tokens.map(parse_qubit).collect::<Result<Vec<_>, _>>()?;
    if targets.is_empty() {
        return Err(format!("gate `{name}` has no targets"));
    }
    let controls = tail
        .split_whitespace()
        .map(parse_qubit)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Instruction::new(name, params, controls, targets))
}

fn parse_qubit(token: &str) -> Result<QuditInfo, String> {
    token
        .parse::<usize>()
        .map(QuditInfo::qubit)
        .map_err(|e| format!("bad qubit index `{token}`: {e}"))
}
