/// Integration tests for the cpu6507 CLI
///
/// Each test writes a small raw image to a temporary file and drives the binary.
use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

fn image(bytes: &[u8]) -> Result<NamedTempFile, Box<dyn std::error::Error>> {
    let mut file = NamedTempFile::new()?;
    file.write_all(bytes)?;
    Ok(file)
}

/// LDA #$42; STA $80; KIL
const PROGRAM: [u8; 5] = [0xA9, 0x42, 0x85, 0x80, 0x02];

#[test]
fn prints_help() -> Result<(), Box<dyn std::error::Error>> {
    Command::cargo_bin("cpu6507")?
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Command line runner and disassembler"));
    Ok(())
}

#[test]
fn run_stops_on_jam() -> Result<(), Box<dyn std::error::Error>> {
    let file = image(&PROGRAM)?;
    Command::cargo_bin("cpu6507")?
        .arg("run")
        .arg(file.path())
        .args(["--start", "F000"])
        .assert()
        .success()
        .stdout(predicate::str::contains("F000  A9 42     LDA #$42      ; 2 cycles"))
        .stdout(predicate::str::contains("F002  85 80     STA $80       ; 3 cycles"))
        .stdout(predicate::str::contains("F004  02        KIL           ; 2 cycles"))
        .stdout(predicate::str::contains("PC=F004 A=42 X=00 Y=00 SP=FF P=sv-Bdizc"))
        .stdout(predicate::str::contains("3 instructions, 7 cycles"));
    Ok(())
}

#[test]
fn run_starts_at_reset_vector() -> Result<(), Box<dyn std::error::Error>> {
    let mut rom = vec![0xEA; 0x1000];
    rom[0x0800..0x0805].copy_from_slice(&PROGRAM);
    rom[0x0FFC] = 0x00;
    rom[0x0FFD] = 0xF8;
    let file = image(&rom)?;
    Command::cargo_bin("cpu6507")?
        .arg("run")
        .arg(file.path())
        .args(["--steps", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("F800  A9 42"))
        .stdout(predicate::str::contains("2 instructions, 5 cycles"));
    Ok(())
}

#[test]
fn run_reports_undefined_opcode() -> Result<(), Box<dyn std::error::Error>> {
    let file = image(&[0xEA, 0x8B])?;
    Command::cargo_bin("cpu6507")?
        .arg("run")
        .arg(file.path())
        .args(["--start", "$F000"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("execution stopped at 0xF001"))
        .stderr(predicate::str::contains("unimplemented opcode: 0x8B"));
    Ok(())
}

#[test]
fn disasm_lists_instructions() -> Result<(), Box<dyn std::error::Error>> {
    let file = image(&PROGRAM)?;
    Command::cargo_bin("cpu6507")?
        .arg("disasm")
        .arg(file.path())
        .args(["--origin", "0x1000", "--count", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1000  A9 42     LDA #$42"))
        .stdout(predicate::str::contains("1002  85 80     STA $80"))
        .stdout(predicate::str::contains("1004  02        KIL"));
    Ok(())
}

#[test]
fn disasm_uses_symbols() -> Result<(), Box<dyn std::error::Error>> {
    let file = image(&[0x85, 0x02, 0x4C, 0x00, 0xF0])?;
    let symbols = image(b"# TIA\nwrite WSYNC $02\nlabel start $F000\n")?;
    Command::cargo_bin("cpu6507")?
        .arg("disasm")
        .arg(file.path())
        .arg("--symbols")
        .arg(symbols.path())
        .args(["--count", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("STA WSYNC"))
        .stdout(predicate::str::contains("JMP start"));
    Ok(())
}

#[test]
fn error_on_missing_image() -> Result<(), Box<dyn std::error::Error>> {
    Command::cargo_bin("cpu6507")?
        .args(["run", "nonexistent.bin"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("image file not found"));
    Ok(())
}

#[test]
fn error_on_empty_image() -> Result<(), Box<dyn std::error::Error>> {
    let file = image(&[])?;
    Command::cargo_bin("cpu6507")?
        .arg("disasm")
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("is empty"));
    Ok(())
}

#[test]
fn error_on_bad_symbol_file() -> Result<(), Box<dyn std::error::Error>> {
    let file = image(&PROGRAM)?;
    let symbols = image(b"label start\n")?;
    Command::cargo_bin("cpu6507")?
        .arg("disasm")
        .arg(file.path())
        .arg("--symbols")
        .arg(symbols.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid symbol file"));
    Ok(())
}

#[test]
fn rejects_bad_address() -> Result<(), Box<dyn std::error::Error>> {
    Command::cargo_bin("cpu6507")?
        .args(["run", "game.bin", "--origin", "zz"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value 'zz'"));
    Ok(())
}

#[test]
fn no_subcommand_prints_usage() -> Result<(), Box<dyn std::error::Error>> {
    Command::cargo_bin("cpu6507")?
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
    Ok(())
}
