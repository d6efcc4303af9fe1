//! Seeded random inputs: token soup must never panic and must always get the
//! same verdict; generated well-formed matches must print canonically.

mod common;

use ovn_match::{parse, parse_match, validate, SymbolTable, Validation};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;

const SEED: u64 = 0x6f76_6e5f_6d61_7463;

const VOCABULARY: &[&str] = &[
    "ip4", "ip6", "tcp", "udp", "tcp.src", "eth.src", "eth.type", "reg0", "vlan.present", "inport",
    "a", "==", "!=", "<", "<=", ">", ">=", "&&", "||", "!", "(", ")", "{", "}", "[", "]", "..", ",",
    "0", "1", "80", "01", "0x800", "0x", "10.0.0.0/8", "::1", "00:11:22:33:44:55", "\"lp1\"", "\"",
    "&", "|", ".", "/", "-", "/*", "//",
];

fn soup(rng: &mut Xoshiro256StarStar) -> String {
    let len = rng.gen_range(0..8);
    (0..len)
        .map(|_| VOCABULARY[rng.gen_range(0..VOCABULARY.len())])
        .collect::<Vec<_>>()
        .join(" ")
}

#[test]
fn token_soup_is_deterministic() {
    common::init_logging();
    let mut rng = Xoshiro256StarStar::seed_from_u64(SEED);
    let fresh = SymbolTable::ovn();

    for _ in 0..2000 {
        let source = soup(&mut rng);
        let first = validate(&source);
        assert_eq!(validate(&source), first, "{source:?}");
        assert_eq!(fresh.validate(&source), first, "{source:?}");

        if let Err(err) = parse(&source) {
            let span = err.span();
            assert!(span.start <= span.end && span.end <= source.len(), "{source:?}: {span:?}");
            assert!(!err.to_string().is_empty());
        }
    }
}

fn atom(rng: &mut Xoshiro256StarStar) -> String {
    match rng.gen_range(0..10) {
        0 => "ip4".to_string(),
        1 => "tcp".to_string(),
        2 => "vlan.present".to_string(),
        3 => "!vlan.present".to_string(),
        4 => format!("tcp.src == {}", rng.gen_range(0..65536u32)),
        5 => format!("tcp.dst != {{{}, {}}}", rng.gen_range(0..1024u32), rng.gen_range(1024..65536u32)),
        6 => format!("eth.src[0..15] == {}", rng.gen_range(0..65536u32)),
        7 => format!("!(reg0[{}] == 1)", rng.gen_range(0..32u32)),
        8 => format!("inport == \"lp{}\"", rng.gen_range(0..100u32)),
        _ => format!("{} < udp.src < {}", rng.gen_range(0..100u32), rng.gen_range(100..65536u32)),
    }
}

fn generate(rng: &mut Xoshiro256StarStar, depth: u32) -> String {
    if depth == 0 || rng.gen_bool(0.3) {
        return atom(rng);
    }
    let op = if rng.gen_bool(0.5) { "&&" } else { "||" };
    let operands: Vec<String> = (0..rng.gen_range(2..4))
        .map(|_| format!("({})", generate(rng, depth - 1)))
        .collect();
    operands.join(&format!(" {op} "))
}

#[test]
fn generated_matches_are_valid_and_print_canonically() {
    common::init_logging();
    let mut rng = Xoshiro256StarStar::seed_from_u64(SEED);

    for _ in 0..500 {
        let source = generate(&mut rng, 3);
        assert_eq!(validate(&source), Validation::Valid, "{source:?}");

        let printed = parse(&source).unwrap().to_string();
        let reprinted = parse(&printed)
            .unwrap_or_else(|e| panic!("{printed:?} (from {source:?}) does not reparse: {e}"))
            .to_string();
        assert_eq!(reprinted, printed, "{source:?}");
    }
}

#[test]
fn long_token_soup_gets_a_verdict() {
    common::init_logging();
    let mut rng = Xoshiro256StarStar::seed_from_u64(SEED ^ 1);

    for _ in 0..20 {
        let len = rng.gen_range(1_000..20_000);
        let source = (0..len)
            .map(|_| VOCABULARY[rng.gen_range(0..VOCABULARY.len())])
            .collect::<Vec<_>>()
            .join(" ");
        let first = validate(&source);
        assert_eq!(validate(&source), first);
    }
}

#[test]
fn deep_nesting_is_rejected_not_fatal() {
    common::init_logging();
    let mut rng = Xoshiro256StarStar::seed_from_u64(SEED ^ 2);

    for _ in 0..20 {
        let depth = rng.gen_range(101..200_000);
        let open: String = (0..depth).map(|_| if rng.gen_bool(0.2) { "!(" } else { "(" }).collect();
        let source = format!("{open}vlan.present{}", ")".repeat(depth));
        assert_eq!(
            parse_match(&source).as_deref(),
            Some("Parentheses nested too deeply."),
            "depth {depth}"
        );
    }

    // Unbalanced input fails the same way.
    assert_eq!(
        parse_match(&"(".repeat(50_000)).as_deref(),
        Some("Parentheses nested too deeply.")
    );
}

#[test]
fn long_flat_chains_are_valid() {
    let source = vec!["tcp.src == 80"; 20_000].join(" && ");
    assert_eq!(validate(&source), Validation::Valid);
    let source = vec!["(ip4 || ip6)"; 20_000].join(" && ");
    assert_eq!(validate(&source), Validation::Valid);
}
