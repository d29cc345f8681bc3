use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::time::Instant;

use anyhow::{bail, Context};
use colored::Colorize;
use rand::{RngCore, SeedableRng};
use serde_json::json;
use sm3_crypto::{
    forge_with, hash_with, leaf_hash, Digest, Engine, MerkleTree, Sm3Hasher, BLOCK_LEN,
};
use tracing::debug;

use crate::cli::*;
use crate::config::CliConfig;

/// Known-answer vectors from GB/T 32905-2016.
const VECTORS: &[(&str, &str)] = &[
    (
        "",
        "1ab21d8355cfa17f8e61194831e81a8f22bec8c728fefb747ed035eb5082aa2b",
    ),
    (
        "abc",
        "66c7f0f462eeedd9d1f2d46bdc10e4e24167c4875cf2f7a2297da02b8f4ba8e0",
    ),
    (
        "abcdabcdabcdabcdabcdabcdabcdabcdabcdabcdabcdabcdabcdabcdabcdabcd",
        "debe9ff92275b8a138604889c18e5a4d6fdb70e5387e5765293dcba39c0c5732",
    ),
];

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = CliConfig::resolve(cli.config.as_deref())?;
    debug!(
        engine = config.engine.name(),
        threshold = config.tree.parallel_threshold,
        "config loaded"
    );
    let json = matches!(cli.format, OutputFormat::Json);

    match cli.command {
        Command::Hash(args) => cmd_hash(args, &config, json),
        Command::Selftest(args) => cmd_selftest(args, json),
        Command::Extend(args) => cmd_extend(args, &config, json),
        Command::ExtensionDemo(args) => cmd_extension_demo(args, &config, json),
        Command::Merkle(args) => cmd_merkle(args, &config, json),
        Command::Bench(args) => cmd_bench(args, json),
    }
}

fn cmd_hash(args: HashArgs, config: &CliConfig, json: bool) -> anyhow::Result<()> {
    let engine = args.engine.map(Engine::from).unwrap_or(config.engine);
    let mut hasher = Sm3Hasher::with_engine(engine);

    let source = if let Some(text) = &args.text {
        hasher.update(text.as_bytes());
        "text".to_string()
    } else if let Some(path) = &args.file {
        let mut file =
            File::open(path).with_context(|| format!("opening {}", path.display()))?;
        io::copy(&mut file, &mut hasher).with_context(|| format!("reading {}", path.display()))?;
        path.display().to_string()
    } else {
        io::copy(&mut io::stdin().lock(), &mut hasher).context("reading stdin")?;
        "stdin".to_string()
    };

    let bytes = hasher.state().bit_length() / 8;
    let digest = hasher.finalize();
    debug!(engine = engine.name(), bytes, "hashed {source}");

    if json {
        println!(
            "{}",
            json!({
                "source": source,
                "engine": engine.name(),
                "bytes": bytes,
                "digest": digest.to_hex(),
            })
        );
    } else {
        println!("{}  {}", digest.to_hex().yellow(), source);
    }
    Ok(())
}

fn cmd_selftest(args: SelftestArgs, json: bool) -> anyhow::Result<()> {
    let mut failures = 0usize;
    let mut results = Vec::new();

    for (input, expected) in VECTORS {
        for engine in [Engine::Reference, Engine::Optimized] {
            let got = hash_with(engine, input.as_bytes()).to_hex();
            let ok = got == *expected;
            if !ok {
                failures += 1;
            }
            if !json {
                let mark = if ok { "✓".green().bold() } else { "✗".red().bold() };
                let label = if input.len() > 16 {
                    format!("{}... ({} bytes)", &input[..8], input.len())
                } else {
                    format!("{input:?}")
                };
                println!("{mark} {:<9} {label}", engine.name());
                if !ok {
                    println!("    expected {expected}");
                    println!("    got      {got}");
                }
            }
            results.push(json!({
                "input": input,
                "engine": engine.name(),
                "ok": ok,
                "digest": got,
            }));
        }
    }

    let mut rng = rand::rngs::StdRng::seed_from_u64(0x5333);
    let mut disagreements = 0usize;
    for _ in 0..args.blocks {
        let mut block = [0u8; BLOCK_LEN];
        rng.fill_bytes(&mut block);
        let mut state = [0u32; 8];
        for word in state.iter_mut() {
            *word = rng.next_u32();
        }
        let mut reference = state;
        let mut optimized = state;
        Engine::Reference.compress(&mut reference, &block);
        Engine::Optimized.compress(&mut optimized, &block);
        if reference != optimized {
            disagreements += 1;
        }
    }
    failures += disagreements;

    if json {
        println!(
            "{}",
            json!({
                "vectors": results,
                "random_blocks": args.blocks,
                "engine_disagreements": disagreements,
                "passed": failures == 0,
            })
        );
    } else if disagreements == 0 {
        println!("{} engines agree on {} random blocks", "✓".green().bold(), args.blocks);
    } else {
        println!(
            "{} engines disagree on {disagreements} of {} random blocks",
            "✗".red().bold(),
            args.blocks
        );
    }

    if failures > 0 {
        bail!("self-test failed: {failures} check(s)");
    }
    Ok(())
}

fn cmd_extend(args: ExtendArgs, config: &CliConfig, json: bool) -> anyhow::Result<()> {
    let original = Digest::from_hex(&args.digest).context("parsing --digest")?;
    let forgery = forge_with(config.engine, &original, args.length, args.suffix.as_bytes());

    if json {
        println!(
            "{}",
            json!({
                "digest": forgery.digest.to_hex(),
                "glue_padding": hex::encode(&forgery.glue_padding),
                "original_length": args.length,
            })
        );
    } else {
        println!("Extended digest: {}", forgery.digest.to_hex().yellow());
        println!(
            "Glue padding ({} bytes): {}",
            forgery.glue_padding.len(),
            hex::encode(&forgery.glue_padding).dimmed()
        );
        println!("Forged message = <original> || glue padding || {:?}", args.suffix);
    }
    Ok(())
}

fn cmd_extension_demo(
    args: ExtensionDemoArgs,
    config: &CliConfig,
    json: bool,
) -> anyhow::Result<()> {
    let engine = config.engine;
    let mut original = args.secret.clone().into_bytes();
    original.extend_from_slice(args.message.as_bytes());
    let published = hash_with(engine, &original);

    // The attacker only sees `published` and the total length.
    let forgery = forge_with(engine, &published, original.len() as u64, args.suffix.as_bytes());
    let forged_message = forgery.forged_message(&original, args.suffix.as_bytes());
    let recomputed = hash_with(engine, &forged_message);
    let success = recomputed == forgery.digest;

    if json {
        println!(
            "{}",
            json!({
                "published_digest": published.to_hex(),
                "original_length": original.len(),
                "forged_digest": forgery.digest.to_hex(),
                "recomputed_digest": recomputed.to_hex(),
                "forged_message": hex::encode(&forged_message),
                "success": success,
            })
        );
    } else {
        println!("Secret:           {:?}", args.secret);
        println!("Message:          {:?}", args.message);
        println!("Published H(s||m): {}", published.to_hex().cyan());
        println!("Known length:     {} bytes", original.len());
        println!("Suffix:           {:?}", args.suffix);
        println!("Forged digest:    {}", forgery.digest.to_hex().yellow());
        println!("Recomputed:       {}", recomputed.to_hex().yellow());
        if success {
            println!("{} length extension succeeded without the secret", "✓".green().bold());
        } else {
            println!("{} forged digest does not match", "✗".red().bold());
        }
    }

    if !success {
        bail!("length extension did not reproduce the digest");
    }
    Ok(())
}

fn read_leaves(args: &MerkleArgs) -> anyhow::Result<Vec<Vec<u8>>> {
    match &args.leaves {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
            BufReader::new(file)
                .lines()
                .map(|line| line.map(String::into_bytes))
                .collect::<io::Result<_>>()
                .with_context(|| format!("reading {}", path.display()))
        }
        None => Ok((0..args.count)
            .map(|i| format!("leaf_data_{i}").into_bytes())
            .collect()),
    }
}

fn cmd_merkle(args: MerkleArgs, config: &CliConfig, json: bool) -> anyhow::Result<()> {
    let leaves = read_leaves(&args)?;
    let start = Instant::now();
    let tree = MerkleTree::build_with_config(&leaves, &config.tree)?;
    let elapsed = start.elapsed();

    let mut report = json!({
        "leaves": tree.leaf_count(),
        "padded_leaves": tree.padded_leaf_count(),
        "depth": tree.depth(),
        "root": tree.root().to_hex(),
        "build_ms": elapsed.as_secs_f64() * 1000.0,
    });
    if !json {
        println!(
            "Leaves: {} (padded to {})",
            tree.leaf_count().to_string().bold(),
            tree.padded_leaf_count()
        );
        println!("Depth:  {}", tree.depth());
        println!("Root:   {}", tree.root().to_hex().yellow());
        println!("Built in {:.2?}", elapsed);
    }

    if let Some(index) = args.prove {
        let proof = tree.proof(index)?;
        let leaf = leaf_hash(&leaves[index]);
        let valid = proof.verify(&leaf, &tree.root());
        if json {
            let path: Vec<_> = proof
                .path
                .iter()
                .map(|(hash, side)| json!({ "hash": hash.to_hex(), "side": side }))
                .collect();
            report["proof"] = json!({
                "index": index,
                "leaf_hash": leaf.to_hex(),
                "path": path,
                "valid": valid,
            });
        } else {
            println!("\nProof for leaf {index} ({} steps):", proof.len());
            for (step, (hash, side)) in proof.path.iter().enumerate() {
                println!("  {step:>2} {:<5} {}", format!("{side:?}"), hash.to_hex().dimmed());
            }
            let mark = if valid { "✓".green().bold() } else { "✗".red().bold() };
            println!("{mark} inclusion proof {}", if valid { "verified" } else { "rejected" });
        }
        if !valid {
            bail!("inclusion proof for leaf {index} did not verify");
        }
    }

    if let Some(data) = &args.absent {
        // Linear scan over leaf hashes; no succinct non-membership proof.
        let absent = tree.is_absent(&leaf_hash(data.as_bytes()));
        if json {
            report["absence"] = json!({ "data": data, "absent": absent });
        } else {
            let mark = if absent { "✓".green().bold() } else { "✗".red().bold() };
            println!("{mark} {data:?} is {}in the tree", if absent { "not " } else { "" });
        }
    }

    if json {
        println!("{report}");
    }
    Ok(())
}

fn cmd_bench(args: BenchArgs, json: bool) -> anyhow::Result<()> {
    if args.iterations == 0 {
        bail!("--iterations must be at least 1");
    }
    let mut data = vec![0u8; args.size];
    rand::rngs::StdRng::seed_from_u64(0x5333).fill_bytes(&mut data);

    let mut rows = Vec::new();
    let mut digests: Vec<Digest> = Vec::new();
    for engine in [Engine::Reference, Engine::Optimized] {
        let start = Instant::now();
        let mut digest = Digest::zero();
        for _ in 0..args.iterations {
            digest = hash_with(engine, std::hint::black_box(&data));
        }
        let secs = start.elapsed().as_secs_f64();
        let mib = (args.size as f64 * args.iterations as f64) / (1024.0 * 1024.0);
        let throughput = if secs > 0.0 { mib / secs } else { f64::INFINITY };
        debug!(engine = engine.name(), secs, "bench finished");
        digests.push(digest);
        rows.push((engine, secs, throughput));
    }

    let speedup = rows[0].1 / rows[1].1.max(f64::MIN_POSITIVE);
    if json {
        let engines: Vec<_> = rows
            .iter()
            .map(|(engine, secs, mib_s)| {
                json!({ "engine": engine.name(), "seconds": secs, "mib_per_s": mib_s })
            })
            .collect();
        println!(
            "{}",
            json!({
                "size": args.size,
                "iterations": args.iterations,
                "engines": engines,
                "speedup": speedup,
            })
        );
    } else {
        println!("{} bytes x {} iterations", args.size, args.iterations);
        for (engine, secs, mib_s) in &rows {
            println!("  {:<9} {:>9.3} s  {:>9.1} MiB/s", engine.name(), secs, mib_s);
        }
        println!("  speedup   {:.2}x", speedup);
    }

    if digests[0] != digests[1] {
        bail!("engines produced different digests");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::fs;
    use std::io::Write;

    fn write_leaf_file(lines: &[&str]) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        fs::write(file.path(), lines.join("\n")).unwrap();
        file
    }

    fn run(args: &[&str]) -> anyhow::Result<()> {
        let mut argv = vec!["sm3"];
        argv.extend_from_slice(args);
        run_command(Cli::try_parse_from(argv).unwrap())
    }

    #[test]
    fn vectors_match_both_engines() {
        for (input, expected) in VECTORS {
            assert_eq!(hash_with(Engine::Reference, input.as_bytes()).to_hex(), *expected);
            assert_eq!(hash_with(Engine::Optimized, input.as_bytes()).to_hex(), *expected);
        }
    }

    #[test]
    fn selftest_passes() {
        run(&["selftest", "--blocks", "32"]).unwrap();
        run(&["--format", "json", "selftest", "--blocks", "8"]).unwrap();
    }

    #[test]
    fn hash_text_and_file() {
        run(&["hash", "--text", "abc"]).unwrap();
        let file = write_leaf_file(&["abc"]);
        run(&["hash", "--engine", "reference", "--file", file.path().to_str().unwrap()]).unwrap();
    }

    #[test]
    fn hash_missing_file_fails() {
        assert!(run(&["hash", "--file", "/nonexistent/input"]).is_err());
    }

    #[test]
    fn extend_rejects_bad_hex() {
        assert!(run(&["extend", "--digest", "zz", "--length", "3", "--suffix", "x"]).is_err());
    }

    #[test]
    fn extend_accepts_published_digest() {
        let digest = hash_with(Engine::Optimized, b"secret_keyhello world").to_hex();
        run(&["extend", "--digest", &digest, "--length", "21", "--suffix", "attack_data"]).unwrap();
    }

    #[test]
    fn extension_demo_succeeds() {
        run(&["extension-demo"]).unwrap();
        run(&["--format", "json", "extension-demo", "--secret", "k", "--message", ""]).unwrap();
    }

    #[test]
    fn merkle_from_file_with_proof_and_absence() {
        let file = write_leaf_file(&["alpha", "beta", "gamma", "delta", "epsilon"]);
        let path = file.path().to_str().unwrap();
        run(&["merkle", "--leaves", path, "--prove", "4", "--absent", "zeta"]).unwrap();
        run(&[
            "--format", "json", "merkle", "--leaves", path, "--prove", "0", "--absent", "beta",
        ])
        .unwrap();
    }

    #[test]
    fn merkle_out_of_range_proof_fails() {
        assert!(run(&["merkle", "--count", "5", "--prove", "5"]).is_err());
    }

    #[test]
    fn merkle_empty_input_fails() {
        assert!(run(&["merkle", "--count", "0"]).is_err());
    }

    #[test]
    fn read_leaves_generates_synthetic_data() {
        let args = MerkleArgs { count: 3, leaves: None, prove: None, absent: None };
        let leaves = read_leaves(&args).unwrap();
        assert_eq!(leaves[2], b"leaf_data_2".to_vec());
    }

    #[test]
    fn bench_runs_small() {
        run(&["bench", "--size", "128", "-n", "2"]).unwrap();
        assert!(run(&["bench", "-n", "0"]).is_err());
    }

    #[test]
    fn config_engine_is_used() {
        let mut config = tempfile::NamedTempFile::new().unwrap();
        writeln!(config, "engine = \"reference\"").unwrap();
        run(&["--config", config.path().to_str().unwrap(), "hash", "--text", "abc"]).unwrap();
    }
}
