use clap::{Parser, Subcommand};
use colored::*;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process::{Command as ProcessCommand, ExitCode};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Format, lint and test the workspace
    Tidy,
    /// Render a placeholder icon set into <DIR>/icons
    Icons {
        #[arg(value_name = "DIR")]
        dir: PathBuf,
    },
}

const LEVELS: [u32; 5] = [0, 25, 50, 75, 100];
const SIZES: [(&str, u32, u32); 3] = [("small", 48, 24), ("medium", 96, 48), ("large", 192, 96)];

fn main() -> ExitCode {
    let args = Args::parse();
    match args.command {
        Command::Tidy => tidy(),
        Command::Icons { dir } => match render_icons(&dir) {
            Ok(count) => print_result(&format!("✓ Wrote {count} icons"), 50, true),
            Err(e) => {
                eprintln!("{}", e.red());
                print_result("× Icons failed", 50, false)
            }
        },
    }
}

fn cargo(args: &[&str]) -> Result<std::process::Output, String> {
    ProcessCommand::new("cargo")
        .args(args)
        .output()
        .map_err(|e| format!("Failed to run cargo {}: {e}", args.join(" ")))
}

fn tidy() -> ExitCode {
    let steps: [(&str, &[&str]); 2] = [
        ("Formatting", &["fmt", "--all"]),
        ("Cargo fix", &["fix", "--allow-dirty", "--workspace"]),
    ];
    for (name, args) in steps {
        match cargo(args) {
            Ok(output) if output.status.success() => println!("{} {name}", "✓".green()),
            Ok(output) => {
                eprintln!("{}", String::from_utf8_lossy(&output.stderr));
                return print_result(&format!("× {name} failed"), 50, false);
            }
            Err(e) => return print_result(&e, 50, false),
        }
    }

    let tests = match cargo(&["test", "--workspace"]) {
        Ok(output) => output,
        Err(e) => return print_result(&e, 50, false),
    };
    if !tests.status.success() {
        let combined = format!(
            "{}{}",
            String::from_utf8_lossy(&tests.stdout),
            String::from_utf8_lossy(&tests.stderr)
        );
        let failed: usize = combined
            .lines()
            .filter(|line| line.starts_with("test result: FAILED."))
            .filter_map(failed_count)
            .sum();
        return print_result(&format!("× {failed} tests failed"), 50, false);
    }
    println!("{} Tests", "✓".green());

    let clippy = match cargo(&["clippy", "--workspace", "--message-format=json"]) {
        Ok(output) => output,
        Err(e) => return print_result(&e, 50, false),
    };
    let warnings = String::from_utf8_lossy(&clippy.stdout)
        .lines()
        .filter(|line| line.contains("\"level\":\"warning\""))
        .count();

    if warnings > 0 {
        print_result(&format!("× Found {warnings} issues"), 50, false)
    } else {
        print_result("✓ Success!", 50, true)
    }
}

/// Pulls `N` out of `test result: FAILED. 3 passed; N failed; ...`.
fn failed_count(line: &str) -> Option<usize> {
    line.split(';')
        .map(str::trim)
        .find(|part| part.ends_with("failed"))
        .and_then(|part| part.split_whitespace().next())
        .and_then(|n| n.parse().ok())
}

fn render_icons(dir: &Path) -> Result<usize, String> {
    let mut count = 0;
    for (name, width, height) in SIZES {
        let size_dir = dir.join("icons").join(name);
        fs::create_dir_all(&size_dir)
            .map_err(|e| format!("Could not create {}: {e}", size_dir.display()))?;

        for level in LEVELS {
            let path = size_dir.join(format!("battery{level}.png"));
            write_png(&path, width, height, &battery_pixels(width, height, level))?;
            count += 1;
        }
    }
    Ok(count)
}

/// A battery outline with a terminal nub on the right, filled left to right by `level` percent.
/// Red below 25%, green otherwise. Everything outside the outline is transparent.
fn battery_pixels(width: u32, height: u32, level: u32) -> Vec<u8> {
    let border = (height / 12).max(1);
    let nub = width / 12;
    let body_right = width - nub;
    let inner_left = border * 2;
    let inner_right = body_right - border * 2;
    let fill_right = inner_left + (inner_right - inner_left) * level / 100;
    let fill = if level < 25 {
        [220, 40, 40, 255]
    } else {
        [60, 200, 80, 255]
    };

    let mut pixels = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            let in_body = x < body_right;
            let on_border =
                in_body && (x < border || x >= body_right - border || y < border || y >= height - border);
            let in_nub = !in_body && y >= height / 3 && y < height - height / 3;
            let in_fill = x >= inner_left
                && x < fill_right
                && y >= border * 2
                && y < height - border * 2;

            let pixel = if on_border || in_nub {
                [240, 240, 240, 255]
            } else if in_fill {
                fill
            } else if in_body {
                [0, 0, 0, 160]
            } else {
                [0, 0, 0, 0]
            };
            pixels.extend_from_slice(&pixel);
        }
    }
    pixels
}

fn write_png(path: &Path, width: u32, height: u32, pixels: &[u8]) -> Result<(), String> {
    let file = File::create(path).map_err(|e| format!("Could not create {}: {e}", path.display()))?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), width, height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);

    encoder
        .write_header()
        .and_then(|mut writer| writer.write_image_data(pixels))
        .map_err(|e| format!("Could not encode {}: {e}", path.display()))
}

fn print_result(message: &str, total_width: usize, success: bool) -> ExitCode {
    let box_width = 24;
    let message_width = message.chars().count().min(box_width);
    let left = (box_width - message_width) / 2;
    let right = box_width - message_width - left;
    let indent = " ".repeat((total_width - box_width) / 2);

    let lines = [
        format!("{indent}┌{}┐", "─".repeat(box_width)),
        format!("{indent}│{}{message}{}│", " ".repeat(left), " ".repeat(right)),
        format!("{indent}└{}┘", "─".repeat(box_width)),
    ]
    .join("\n");

    println!("\n{}", "=".repeat(total_width).cyan());
    if success {
        println!("\n{}\n", lines.bold().green());
        ExitCode::SUCCESS
    } else {
        println!("\n{}\n", lines.bold().red());
        ExitCode::FAILURE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_count() {
        assert_eq!(
            failed_count("test result: FAILED. 12 passed; 3 failed; 0 ignored"),
            Some(3)
        );
        assert_eq!(failed_count("test result: ok. 12 passed"), None);
    }

    #[test]
    fn test_battery_pixels() {
        let empty = battery_pixels(48, 24, 0);
        let full = battery_pixels(48, 24, 100);
        assert_eq!(empty.len(), 48 * 24 * 4);
        assert_ne!(empty, full);
        // Top left corner is always the outline.
        assert_eq!(&full[..4], &[240, 240, 240, 255]);
    }
}
