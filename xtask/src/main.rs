// Build automation tool - suppress style lints
#![allow(clippy::needless_borrow)]
#![allow(clippy::useless_format)]

use serde::Deserialize;
use sha2::{Digest, Sha256};
use shell_escape::escape;
use std::borrow::Cow;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

const TARGET: &str = "armv7a-none-eabi";
const BIN: &str = "biscuit_boot";
const QEMU: &str = "qemu-system-arm";

fn run(cmd: &mut Command) -> anyhow::Result<()> {
    eprintln!("[RUN] {:?}", cmd);
    let status = cmd.status()?;
    if !status.success() {
        anyhow::bail!("command failed: {:?}", cmd);
    }
    Ok(())
}

fn cargo() -> Command {
    Command::new("cargo")
}

fn rustup() -> Command {
    Command::new("rustup")
}

fn root() -> anyhow::Result<PathBuf> {
    // xtask lives one level below the workspace root
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| anyhow::anyhow!("xtask has no parent directory"))
}

fn ensure_dirs() -> anyhow::Result<(PathBuf, PathBuf)> {
    let r = root()?;
    let build = r.join("build");
    let dist = r.join("build/dist");
    fs::create_dir_all(&dist)?;
    Ok((build, dist))
}

fn task_fmt() -> anyhow::Result<()> {
    run(cargo().args(["fmt", "--all"]))
}

fn task_fmt_check() -> anyhow::Result<()> {
    run(cargo().args(["fmt", "--all", "--", "--check"]))
}

fn task_clippy() -> anyhow::Result<()> {
    run(cargo().args([
        "clippy",
        "--workspace",
        "--all-targets",
        "--all-features",
        "--",
        "-D",
        "warnings",
    ]))
}

fn task_test() -> anyhow::Result<()> {
    run(cargo().args(["test", "-p", BIN, "--all-features"]))
}

fn task_check() -> anyhow::Result<()> {
    task_fmt_check()?;
    task_clippy()?;
    task_test()
}

fn task_env_check() -> anyhow::Result<()> {
    eprintln!("[INFO] Checking rustup target {}...", TARGET);
    run(rustup()
        .args(["target", "add", TARGET])
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null()))?;

    let mut missing_tools = Vec::new();
    if !have(QEMU) {
        missing_tools.push(QEMU);
        eprintln!("[WARN] {} not found. Install QEMU for ARM systems.", QEMU);
        eprintln!("[INFO] On macOS: `brew install qemu`");
        eprintln!("[INFO] On Ubuntu/Debian: `sudo apt install qemu-system-arm`");
    }
    if find_objcopy().is_none() {
        missing_tools.push("objcopy");
        eprintln!("[WARN] no objcopy found; raw .bin images will not be produced.");
        eprintln!("[INFO] `rustup component add llvm-tools` or install binutils-arm-none-eabi");
    }

    for tool in ["rustc", "cargo", QEMU] {
        print_version(tool);
    }

    if missing_tools.is_empty() {
        eprintln!("[INFO] All tools present.");
    } else {
        eprintln!("[WARN] Missing: {}", missing_tools.join(", "));
    }
    Ok(())
}

#[derive(Debug)]
struct BuildOpts {
    release: bool,
    kernel: Option<PathBuf>,
    backtrace: bool,
}

fn parse_build_opts(args: &[String]) -> anyhow::Result<BuildOpts> {
    let mut opts = BuildOpts {
        release: true,
        kernel: None,
        backtrace: false,
    };
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--debug" => {
                opts.release = false;
                i += 1;
            }
            "--kernel" if i + 1 < args.len() => {
                opts.kernel = Some(PathBuf::from(&args[i + 1]));
                i += 2;
            }
            "--backtrace" => {
                opts.backtrace = true;
                i += 1;
            }
            other => anyhow::bail!("unknown build option: {}", other),
        }
    }
    Ok(opts)
}

/// Cross-build the bootloader, returning the dist ELF and raw binary
fn build_bootloader(opts: &BuildOpts) -> anyhow::Result<(PathBuf, Option<PathBuf>)> {
    let (_build, dist) = ensure_dirs()?;
    let root_dir = root()?;
    let profile_dir = if opts.release { "release" } else { "debug" };

    eprintln!("[BUILD] Building {} for {} ({})...", BIN, TARGET, profile_dir);

    let mut cmd = cargo();
    cmd.args(["build", "--target", TARGET, "--bin", BIN]);
    if opts.release {
        cmd.arg("--release");
    }
    if opts.backtrace {
        cmd.args(["--features", "backtrace"]);
    }
    match &opts.kernel {
        Some(kernel) => {
            let kernel = fs::canonicalize(kernel)
                .map_err(|e| anyhow::anyhow!("kernel image {}: {}", kernel.display(), e))?;
            eprintln!("[BUILD] Embedding kernel {}", kernel.display());
            cmd.env("BISCUIT_KERNEL_IMAGE", kernel);
        }
        None => {
            eprintln!("[WARN] No --kernel given; the bootloader will refuse to boot");
        }
    }
    run(&mut cmd)?;

    let elf_in_target = root_dir.join(format!("target/{}/{}/{}", TARGET, profile_dir, BIN));
    let out_elf = dist.join(format!("{}.elf", BIN));
    fs::copy(&elf_in_target, &out_elf)?;

    let out_bin = dist.join(format!("{}.bin", BIN));
    let bin = match find_objcopy() {
        Some(objcopy) => {
            eprintln!(
                "[OBJCOPY] Using {} to create binary -> {}",
                objcopy,
                out_bin.display()
            );
            let status = Command::new(objcopy)
                .args(["-O", "binary"])
                .arg(&elf_in_target)
                .arg(&out_bin)
                .status();
            match status {
                Ok(s) if s.success() => Some(out_bin),
                _ => {
                    eprintln!("[WARN] objcopy failed; only the ELF is available");
                    None
                }
            }
        }
        None => {
            eprintln!("[WARN] objcopy not found; only the ELF is available");
            None
        }
    };

    eprintln!("[SIZE] {}.elf: {} bytes", BIN, out_elf.metadata()?.len());
    eprintln!("[ARTIFACT] {}", out_elf.display());
    if let Some(bin) = &bin {
        eprintln!("[SIZE] {}.bin: {} bytes", BIN, bin.metadata()?.len());
        eprintln!("[ARTIFACT] {}", bin.display());
    }
    Ok((out_elf, bin))
}

fn task_build(args: &[String]) -> anyhow::Result<()> {
    let opts = parse_build_opts(args)?;
    let (_build, dist) = ensure_dirs()?;
    let (elf, bin) = build_bootloader(&opts)?;

    let mut artifacts: Vec<(String, PathBuf)> = vec![(format!("{}.elf", BIN), elf)];
    if let Some(bin) = bin {
        artifacts.push((format!("{}.bin", BIN), bin));
    }
    if let Some(kernel) = &opts.kernel {
        let name = kernel
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "kernel".into());
        artifacts.push((name, kernel.clone()));
    }

    let sums_path = dist.join("SHA256SUMS");
    let mut sums_content = String::new();
    for (name, path) in &artifacts {
        sums_content.push_str(&format!("{}  {}\n", sha256_file(path)?, name));
    }
    fs::write(&sums_path, sums_content)?;
    eprintln!("[ARTIFACT] {}", sums_path.display());

    write_manifest(&artifacts, &opts)
}

fn have(cmd: &str) -> bool {
    which::which(cmd).is_ok()
}

fn find_objcopy() -> Option<&'static str> {
    [
        "llvm-objcopy",
        "rust-objcopy",
        "arm-none-eabi-objcopy",
        "objcopy",
    ]
    .into_iter()
    .find(|c| have(c))
}

fn sha256_file(path: &Path) -> anyhow::Result<String> {
    let data = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

fn print_version(cmd: &str) {
    match tool_version(cmd) {
        Some(v) => eprintln!("[VER] {}: {}", cmd, v),
        None => eprintln!("[VER] {}: not found", cmd),
    }
}

fn tool_version(cmd: &str) -> Option<String> {
    let out = Command::new(cmd).arg("--version").output().ok()?;
    let first_line = |bytes: &[u8]| {
        String::from_utf8_lossy(bytes)
            .lines()
            .next()
            .unwrap_or("")
            .to_string()
    };
    let mut s = first_line(&out.stdout);
    if s.is_empty() {
        s = first_line(&out.stderr);
    }
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn write_manifest(artifacts: &[(String, PathBuf)], opts: &BuildOpts) -> anyhow::Result<()> {
    let (_build, dist) = ensure_dirs()?;
    let mut list = vec![];
    for (name, path) in artifacts {
        if path.exists() {
            let size = path.metadata().map(|m| m.len()).unwrap_or(0);
            let sum = sha256_file(path).ok();
            list.push(serde_json::json!({ "name": name, "path": path.to_string_lossy(), "bytes": size, "sha256": sum }));
        }
    }
    let manifest = serde_json::json!({
        "versions": {
            "rustc": tool_version("rustc"),
            "cargo": tool_version("cargo"),
            QEMU: tool_version(QEMU),
            "objcopy": find_objcopy(),
        },
        "build": {
            "target": TARGET,
            "profile": if opts.release { "release" } else { "debug" },
            "backtrace": opts.backtrace,
        },
        "artifacts": list,
        "meta": {
            "timestamp": std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).ok().map(|d| d.as_secs()),
            "xtask_version": env!("CARGO_PKG_VERSION"),
        }
    });
    let out = dist.join("MANIFEST.json");
    fs::write(&out, serde_json::to_vec_pretty(&manifest)?)?;
    eprintln!("[ARTIFACT] {}", out.display());
    Ok(())
}

/// `~/.biscuit_qemu.toml`
#[derive(Deserialize, Default, Debug)]
#[serde(default)]
struct QemuConfig {
    machine: Option<String>,
    mem: Option<String>,
    extra: Vec<String>,
}

#[derive(Debug)]
struct QemuOpts {
    machine: String,
    mem: String,
    gdb: bool,
    debug_flags: Option<String>,
    logfile: Option<PathBuf>,
    extra: Vec<String>,
}

fn read_qemu_config() -> Option<QemuConfig> {
    let home = env::var("HOME").ok()?;
    let path = PathBuf::from(home).join(".biscuit_qemu.toml");
    let s = fs::read_to_string(&path).ok()?;
    match toml::from_str(&s) {
        Ok(config) => Some(config),
        Err(e) => {
            eprintln!("[WARN] ignoring {}: {}", path.display(), e);
            None
        }
    }
}

fn parse_qemu_opts(args: &[String]) -> QemuOpts {
    let config = read_qemu_config().unwrap_or_default();
    let mut q = QemuOpts {
        machine: config.machine.unwrap_or_else(|| "sabrelite".into()),
        // RAM must reach the top of the reserved zone at 0x90000000
        mem: config.mem.unwrap_or_else(|| "2G".into()),
        gdb: false,
        debug_flags: None,
        logfile: None,
        extra: config.extra,
    };
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--machine" if i + 1 < args.len() => {
                q.machine = args[i + 1].clone();
                i += 2;
            }
            "--mem" if i + 1 < args.len() => {
                q.mem = args[i + 1].clone();
                i += 2;
            }
            "--gdb" => {
                q.gdb = true;
                i += 1;
            }
            "--debug-flags" if i + 1 < args.len() => {
                q.debug_flags = Some(args[i + 1].clone());
                i += 2;
            }
            "--logfile" if i + 1 < args.len() => {
                q.logfile = Some(PathBuf::from(&args[i + 1]));
                i += 2;
            }
            "--" => {
                q.extra.extend_from_slice(&args[i + 1..]);
                break;
            }
            other => {
                q.extra.push(other.to_string());
                i += 1;
            }
        }
    }
    q
}

fn task_qemu(args: &[String]) -> anyhow::Result<()> {
    let (_build, dist) = ensure_dirs()?;
    let opts = parse_qemu_opts(args);

    let elf = dist.join(format!("{}.elf", BIN));
    if !elf.exists() {
        eprintln!("[INFO] {} not found, building...", elf.display());
        task_build(&[])?;
    }
    if !have(QEMU) {
        anyhow::bail!("{} not found. Please install QEMU for ARM systems.", QEMU);
    }

    let mut cmd = Command::new(QEMU);
    cmd.args(["-M", &opts.machine])
        .args(["-m", &opts.mem])
        .arg("-nographic")
        // UART1 is unused; the console is UART2
        .args(["-serial", "null", "-serial", "mon:stdio"])
        .arg("-kernel")
        .arg(&elf);
    if let Some(flags) = &opts.debug_flags {
        cmd.args(["-d", flags]);
    }
    if let Some(logfile) = &opts.logfile {
        cmd.arg("-D").arg(logfile);
    }
    if opts.gdb {
        eprintln!("[QEMU] Waiting for gdb on :1234 (target remote :1234)");
        cmd.args(["-s", "-S"]);
    }
    cmd.args(&opts.extra);

    let line: Vec<Cow<str>> = std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(|a| escape(a.to_string_lossy()))
        .collect();
    eprintln!("[QEMU] {}", line.join(" "));
    run(&mut cmd)
}

fn task_clean() -> anyhow::Result<()> {
    eprintln!("[CLEAN] Cleaning build artifacts...");
    run(cargo().args(["clean"]))?;

    let build_dir = root()?.join("build");
    if build_dir.exists() {
        fs::remove_dir_all(&build_dir)?;
        eprintln!("[CLEAN] Removed build directory: {}", build_dir.display());
    } else {
        eprintln!("[CLEAN] Build directory not found, skipping removal.");
    }
    Ok(())
}

fn print_help() {
    eprintln!(
        "xtask commands:\n  fmt | fmt-check | clippy | test | check | env-check | clean\n  build [--kernel <file>] [--debug] [--backtrace]\n  qemu [--machine <name>] [--mem <size>] [--gdb] [--debug-flags <flags>] [--logfile <file>] [-- <extra qemu args>]\n\nQEMU defaults come from ~/.biscuit_qemu.toml (machine, mem, extra) when present.\n\nExamples:\n  cargo run -p xtask -- check\n  cargo run -p xtask -- build --kernel ../kernel/build/kernel.bin\n  cargo run -p xtask -- qemu --debug-flags guest_errors,int\n  cargo run -p xtask -- qemu --gdb"
    );
}

fn main() -> anyhow::Result<()> {
    let mut args = env::args().skip(1);
    let cmd = args.next().unwrap_or_else(|| "help".into());
    let rest: Vec<String> = args.collect();
    match cmd.as_str() {
        "fmt" => task_fmt(),
        "fmt-check" => task_fmt_check(),
        "clippy" => task_clippy(),
        "test" => task_test(),
        "check" => task_check(),
        "env-check" => task_env_check(),
        "build" => task_build(&rest),
        "qemu" => task_qemu(&rest),
        "clean" => task_clean(),
        _ => {
            print_help();
            Ok(())
        }
    }
}
