use anyhow::{Context, Result};
use bringup_hal::regs::{
    Layout, CHAR_PORT_ADDR, FPGA_DUAL_FRAME_BASE, FPGA_LCD_BASE, IRQ_CONTROLLER_BASE, WORD_SIZE,
};
use bringup_hal::variants::DEFAULT_TIMER_PERIOD;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VariantKind {
    Hello,
    EchoInt,
    CpuIrq,
    TimerIrq,
    DoubleBuffer,
    FillRect,
}

impl VariantKind {
    pub const ALL: [VariantKind; 6] = [
        VariantKind::Hello,
        VariantKind::EchoInt,
        VariantKind::CpuIrq,
        VariantKind::TimerIrq,
        VariantKind::DoubleBuffer,
        VariantKind::FillRect,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            VariantKind::Hello => "hello",
            VariantKind::EchoInt => "echo-int",
            VariantKind::CpuIrq => "cpu-irq",
            VariantKind::TimerIrq => "timer-irq",
            VariantKind::DoubleBuffer => "double-buffer",
            VariantKind::FillRect => "fill-rect",
        }
    }

    /// FPGA layout the variant drives, if any.
    pub fn required_layout(self) -> Option<LayoutKind> {
        match self {
            VariantKind::TimerIrq => Some(LayoutKind::DualFrame),
            VariantKind::DoubleBuffer | VariantKind::FillRect => Some(LayoutKind::Lcd),
            _ => None,
        }
    }

    pub fn needs_irq_controller(self) -> bool {
        matches!(self, VariantKind::CpuIrq | VariantKind::TimerIrq)
    }
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VariantKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        VariantKind::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownVariant(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutKind {
    Lcd,
    DualFrame,
}

impl LayoutKind {
    /// Size of the register window in bytes.
    pub fn window_size(self) -> u32 {
        Layout::from(self).window_size()
    }
}

impl From<LayoutKind> for Layout {
    fn from(kind: LayoutKind) -> Self {
        match kind {
            LayoutKind::Lcd => Layout::Lcd,
            LayoutKind::DualFrame => Layout::DualFrame,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("Unknown variant '{0}'")]
    UnknownVariant(String),
    #[error("Variant '{variant}' needs an FPGA block with the {expected:?} layout")]
    MissingFpga {
        variant: VariantKind,
        expected: LayoutKind,
    },
    #[error("Variant '{variant}' needs the {expected:?} layout, found {found:?}")]
    WrongLayout {
        variant: VariantKind,
        expected: LayoutKind,
        found: LayoutKind,
    },
    #[error("Variant '{0}' needs a CPU interrupt controller")]
    MissingIrqController(VariantKind),
    #[error("Register window at {base:#x} (+{size:#x}) runs past the end of the address space")]
    WindowOverflow { base: u32, size: u32 },
    #[error("'cycles_per_step' must be greater than zero")]
    ZeroCycles,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FpgaConfig {
    pub base: u32,
    pub layout: LayoutKind,
}

fn default_char_port() -> u32 {
    CHAR_PORT_ADDR
}

fn default_timer_period() -> u32 {
    DEFAULT_TIMER_PERIOD
}

fn default_cycles_per_step() -> u32 {
    10_000
}

fn default_vram_base() -> u32 {
    0x0010_0000
}

/// Hardware description of one bring-up board plus the program it runs.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PlatformDescriptor {
    pub name: String,
    pub variant: VariantKind,
    #[serde(default = "default_char_port")]
    pub char_port: u32,
    #[serde(default)]
    pub fpga: Option<FpgaConfig>,
    #[serde(default)]
    pub irq_controller: Option<u32>,
    #[serde(default = "default_timer_period")]
    pub timer_period: u32,
    /// Timer cycles simulated per main-loop iteration.
    #[serde(default = "default_cycles_per_step")]
    pub cycles_per_step: u32,
    /// Where simulated framebuffers are placed in the address map.
    #[serde(default = "default_vram_base")]
    pub vram_base: u32,
    #[serde(default)]
    pub seed: u64,
    /// Bytes presented on the character port, in order.
    #[serde(default)]
    pub input: String,
}

impl PlatformDescriptor {
    /// The stock board for `variant`.
    pub fn builtin(variant: VariantKind) -> Self {
        let fpga = variant.required_layout().map(|layout| FpgaConfig {
            base: match layout {
                LayoutKind::Lcd => FPGA_LCD_BASE,
                LayoutKind::DualFrame => FPGA_DUAL_FRAME_BASE,
            },
            layout,
        });
        Self {
            name: format!("builtin-{}", variant),
            variant,
            char_port: default_char_port(),
            fpga,
            irq_controller: variant
                .needs_irq_controller()
                .then_some(IRQ_CONTROLLER_BASE),
            timer_period: default_timer_period(),
            cycles_per_step: default_cycles_per_step(),
            vram_base: default_vram_base(),
            seed: 0,
            input: String::new(),
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = std::fs::File::open(&path)
            .with_context(|| format!("Failed to open platform descriptor at {:?}", path.as_ref()))?;
        let desc: Self =
            serde_yaml::from_reader(f).context("Failed to parse Platform Descriptor")?;
        desc.validate()?;
        Ok(desc)
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if let Some(expected) = self.variant.required_layout() {
            let fpga = self.fpga.as_ref().ok_or(ConfigError::MissingFpga {
                variant: self.variant,
                expected,
            })?;
            if fpga.layout != expected {
                return Err(ConfigError::WrongLayout {
                    variant: self.variant,
                    expected,
                    found: fpga.layout,
                });
            }
        }
        if self.variant.needs_irq_controller() && self.irq_controller.is_none() {
            return Err(ConfigError::MissingIrqController(self.variant));
        }
        if let Some(fpga) = &self.fpga {
            check_window(fpga.base, fpga.layout.window_size())?;
        }
        if let Some(base) = self.irq_controller {
            check_window(base, 2 * WORD_SIZE)?;
        }
        if self.cycles_per_step == 0 {
            return Err(ConfigError::ZeroCycles);
        }
        Ok(())
    }
}

fn check_window(base: u32, size: u32) -> std::result::Result<(), ConfigError> {
    if base as u64 + size as u64 > 1u64 << 32 {
        return Err(ConfigError::WindowOverflow { base, size });
    }
    Ok(())
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct TestInputs {
    /// Path to a platform descriptor, relative to the script.
    #[serde(default)]
    pub platform: Option<String>,
    /// Built-in board, used when no descriptor is given.
    #[serde(default)]
    pub variant: Option<VariantKind>,
    /// Overrides the descriptor's console input.
    #[serde(default)]
    pub input: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct TestLimits {
    pub max_steps: u64,
    #[serde(default)]
    pub wall_time_ms: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    MaxSteps,
    WallTime,
    Exit,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct UartContainsAssertion {
    pub uart_contains: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct StopReasonAssertion {
    pub expected_stop_reason: StopReason,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ExitCodeAssertion {
    pub exit_code: i32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct MinInterruptsAssertion {
    pub min_interrupts: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct FramePointerAlternatesAssertion {
    pub frame_pointer_alternates: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct LutBeforeEnableAssertion {
    pub lut_before_enable: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(untagged)]
pub enum TestAssertion {
    UartContains(UartContainsAssertion),
    ExpectedStopReason(StopReasonAssertion),
    ExitCode(ExitCodeAssertion),
    MinInterrupts(MinInterruptsAssertion),
    FramePointerAlternates(FramePointerAlternatesAssertion),
    LutBeforeEnable(LutBeforeEnableAssertion),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct TestScript {
    pub schema_version: String,
    pub inputs: TestInputs,
    pub limits: TestLimits,
    #[serde(default)]
    pub assertions: Vec<TestAssertion>,
}

impl TestScript {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = std::fs::File::open(&path)
            .with_context(|| format!("Failed to open test script at {:?}", path.as_ref()))?;
        let script: Self =
            serde_yaml::from_reader(f).context("Failed to parse Test Script YAML")?;
        script.validate()?;
        Ok(script)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version != "1.0" {
            anyhow::bail!(
                "Unsupported schema_version '{}'. Supported versions: '1.0'",
                self.schema_version
            );
        }

        match (&self.inputs.platform, &self.inputs.variant) {
            (Some(_), Some(_)) => {
                anyhow::bail!("Inputs 'platform' and 'variant' are mutually exclusive")
            }
            (None, None) => anyhow::bail!("One of 'platform' or 'variant' must be given"),
            (Some(p), None) if p.trim().is_empty() => {
                anyhow::bail!("Input 'platform' path cannot be empty")
            }
            _ => {}
        }

        if self.limits.max_steps == 0 {
            anyhow::bail!("Limit 'max_steps' must be greater than zero");
        }

        Ok(())
    }
}
