//! `bringup test`: run a scenario script and evaluate its assertions.

use crate::{EXIT_ASSERT_FAIL, EXIT_CONFIG_ERROR, EXIT_PASS, EXIT_RUNTIME_ERROR};
use anyhow::Context;
use bringup_config::{StopReason, TestAssertion, TestScript};
use bringup_core::Machine;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Scenarios asking for more iterations than this are rejected up front.
pub const MAX_ALLOWED_STEPS: u64 = 50_000_000;

#[derive(clap::Args, Debug)]
pub struct TestArgs {
    /// Path to the scenario script (YAML)
    #[arg(short, long)]
    pub script: PathBuf,

    /// Directory receiving result.json and junit.xml
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Additional path for a JUnit XML report
    #[arg(long)]
    pub junit: Option<PathBuf>,

    /// Do not echo character port output to stdout
    #[arg(long)]
    pub no_uart_stdout: bool,

    /// Enable per-access tracing
    #[arg(short, long)]
    pub trace: bool,
}

#[derive(Debug, Serialize)]
struct AssertionResult {
    assertion: TestAssertion,
    passed: bool,
}

#[derive(Debug, Serialize)]
struct FrameHash {
    index: usize,
    address: u32,
    sha256: String,
}

#[derive(Debug, Serialize)]
struct ScenarioConfig {
    script: String,
    platform: Option<String>,
    variant: String,
    max_steps: u64,
    wall_time_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
struct ScenarioResult {
    status: &'static str,
    stop_reason: StopReason,
    steps: u64,
    interrupts: u64,
    rejected_interrupts: u64,
    exit_code: Option<i32>,
    bus_faults: u64,
    uart: String,
    duration_ms: u64,
    assertions: Vec<AssertionResult>,
    frames: Vec<FrameHash>,
    config: ScenarioConfig,
}

pub fn run(args: TestArgs) -> u8 {
    info!("Loading test script: {:?}", args.script);
    let script = match TestScript::from_file(&args.script) {
        Ok(script) => script,
        Err(e) => {
            error!("{:#}", e);
            return EXIT_CONFIG_ERROR;
        }
    };

    if script.limits.max_steps > MAX_ALLOWED_STEPS {
        error!(
            "max_steps {} exceeds the allowed maximum of {}",
            script.limits.max_steps, MAX_ALLOWED_STEPS
        );
        return EXIT_CONFIG_ERROR;
    }

    let platform = script
        .inputs
        .platform
        .as_ref()
        .map(|p| resolve_relative(&args.script, p));
    let mut desc = match crate::load_descriptor(script.inputs.variant, platform.as_deref()) {
        Ok(desc) => desc,
        Err(e) => {
            error!("{:#}", e);
            return EXIT_CONFIG_ERROR;
        }
    };
    if let Some(input) = &script.inputs.input {
        desc.input = input.clone();
    }

    let mut machine = match bringup_core::build_machine(&desc, !args.no_uart_stdout) {
        Ok(machine) => machine,
        Err(e) => {
            error!("Failed to assemble the simulated board: {}", e);
            return EXIT_CONFIG_ERROR;
        }
    };

    let wall_time = script.limits.wall_time_ms.map(Duration::from_millis);
    let start = Instant::now();
    let stop_reason = machine.run(script.limits.max_steps, wall_time);
    let duration = start.elapsed();
    info!(
        "Scenario stopped ({:?}) after {} steps in {:?}",
        stop_reason,
        machine.steps(),
        duration
    );

    let assertions: Vec<AssertionResult> = script
        .assertions
        .iter()
        .map(|assertion| {
            let passed = evaluate(assertion, &machine, stop_reason);
            if !passed {
                warn!("Assertion failed: {:?}", assertion);
            }
            AssertionResult {
                assertion: assertion.clone(),
                passed,
            }
        })
        .collect();
    let passed = assertions.iter().all(|a| a.passed);

    let result = ScenarioResult {
        status: if passed { "pass" } else { "fail" },
        stop_reason,
        steps: machine.steps(),
        interrupts: machine.interrupts(),
        rejected_interrupts: machine.rejected_interrupts(),
        exit_code: machine.exit_code(),
        bus_faults: machine.bus.fault_count(),
        uart: machine.char_output(),
        duration_ms: duration.as_millis() as u64,
        assertions,
        frames: frame_hashes(&machine),
        config: ScenarioConfig {
            script: args.script.display().to_string(),
            platform: platform.map(|p| p.display().to_string()),
            variant: desc.variant.to_string(),
            max_steps: script.limits.max_steps,
            wall_time_ms: script.limits.wall_time_ms,
        },
    };

    if let Err(e) = write_outputs(&args, &result) {
        error!("{:#}", e);
        return EXIT_RUNTIME_ERROR;
    }

    if passed {
        info!("Scenario passed");
        EXIT_PASS
    } else {
        error!("Scenario failed");
        EXIT_ASSERT_FAIL
    }
}

/// Paths in a script are relative to the script's own directory.
fn resolve_relative(script: &Path, path: &str) -> PathBuf {
    script
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(path)
}

fn evaluate(assertion: &TestAssertion, machine: &Machine, stop_reason: StopReason) -> bool {
    match assertion {
        TestAssertion::UartContains(a) => machine.char_output().contains(&a.uart_contains),
        TestAssertion::ExpectedStopReason(a) => a.expected_stop_reason == stop_reason,
        TestAssertion::ExitCode(a) => machine.exit_code() == Some(a.exit_code),
        TestAssertion::MinInterrupts(a) => machine.interrupts() >= a.min_interrupts,
        TestAssertion::FramePointerAlternates(a) => {
            let ok = machine.fpga().is_some_and(|f| f.frame_pointer_alternates());
            ok == a.frame_pointer_alternates
        }
        TestAssertion::LutBeforeEnable(a) => {
            let ok = machine
                .fpga()
                .is_some_and(|f| f.lut_loaded_once_before_enable());
            ok == a.lut_before_enable
        }
    }
}

fn frame_hashes(machine: &Machine) -> Vec<FrameHash> {
    (0..)
        .map_while(|i| machine.frame(i).map(|frame| (i, frame)))
        .map(|(index, (address, pixels))| FrameHash {
            index,
            address,
            sha256: format!("{:x}", Sha256::digest(pixels)),
        })
        .collect()
}

fn write_outputs(args: &TestArgs, result: &ScenarioResult) -> anyhow::Result<()> {
    if let Some(dir) = &args.output_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory {:?}", dir))?;

        let json = serde_json::to_string_pretty(result)?;
        let result_path = dir.join("result.json");
        std::fs::write(&result_path, json)
            .with_context(|| format!("Failed to write {:?}", result_path))?;

        let junit_path = dir.join("junit.xml");
        std::fs::write(&junit_path, junit_report(result))
            .with_context(|| format!("Failed to write {:?}", junit_path))?;
        info!("Results written to {:?}", dir);
    }

    if let Some(path) = &args.junit {
        std::fs::write(path, junit_report(result))
            .with_context(|| format!("Failed to write {:?}", path))?;
    }
    Ok(())
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn junit_report(result: &ScenarioResult) -> String {
    let failures = result.assertions.iter().filter(|a| !a.passed).count();
    let seconds = result.duration_ms as f64 / 1000.0;
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str(&format!(
        "<testsuite name=\"bringup test\" tests=\"{}\" failures=\"{}\" time=\"{:.3}\">\n",
        result.assertions.len().max(1),
        failures,
        seconds
    ));

    let suite = xml_escape(&result.config.script);
    if result.assertions.is_empty() {
        xml.push_str(&format!(
            "  <testcase classname=\"{}\" name=\"run\" time=\"{:.3}\"/>\n",
            suite, seconds
        ));
    }
    for (i, a) in result.assertions.iter().enumerate() {
        let name = serde_json::to_string(&a.assertion).unwrap_or_else(|_| format!("assertion {}", i));
        xml.push_str(&format!(
            "  <testcase classname=\"{}\" name=\"{}\">",
            suite,
            xml_escape(&name)
        ));
        if !a.passed {
            xml.push_str(&format!(
                "<failure message=\"assertion failed\">stop_reason={:?} steps={} interrupts={}</failure>",
                result.stop_reason, result.steps, result.interrupts
            ));
        }
        xml.push_str("</testcase>\n");
    }
    xml.push_str("</testsuite>\n");
    xml
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_resolved_next_to_script() {
        let p = resolve_relative(Path::new("/lab/scenarios/smoke.yaml"), "board.yaml");
        assert_eq!(p, PathBuf::from("/lab/scenarios/board.yaml"));
        let p = resolve_relative(Path::new("smoke.yaml"), "board.yaml");
        assert_eq!(p, PathBuf::from("board.yaml"));
    }

    #[test]
    fn test_xml_escape() {
        assert_eq!(xml_escape("<a & \"b\">"), "&lt;a &amp; &quot;b&quot;&gt;");
    }
}
