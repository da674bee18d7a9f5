//! Training loggers for SVG.
//!
//! Loggers consume an [`SvgSnapshot`] per training step. Backends:
//!
//! - [`ConsoleLogger`]: fixed-width table on stdout
//! - [`CsvLogger`]: one row per snapshot, for offline analysis
//! - [`MultiLogger`]: fan-out to several loggers

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Instant;

use crate::algorithms::svg::SvgStepInfo;

/// What one SVG training step reports.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SvgSnapshot {
    /// Training step.
    pub step: usize,
    /// Environment steps collected so far.
    pub env_steps: usize,
    pub transition_loss: f32,
    pub reward_loss: f32,
    pub critic_loss: f32,
    pub policy_loss: f32,
    /// Mean imagined target value of the policy batch.
    pub imagined_return: f32,
    /// Mean total entropy of imagined trajectories.
    pub entropy: f32,
    /// Entropy-regularisation coefficient.
    pub entropy_coef: f32,
}

impl SvgSnapshot {
    pub fn new(step: usize, env_steps: usize) -> Self {
        Self {
            step,
            env_steps,
            ..Default::default()
        }
    }

    pub fn from_step_info(step: usize, env_steps: usize, info: &SvgStepInfo) -> Self {
        Self::new(step, env_steps).with_step_info(info)
    }

    /// Copy losses and diagnostics from a learner step.
    pub fn with_step_info(mut self, info: &SvgStepInfo) -> Self {
        self.transition_loss = info.transition_loss;
        self.reward_loss = info.reward_loss;
        self.critic_loss = info.critic_loss;
        self.policy_loss = info.policy_loss;
        self.imagined_return = info.mean_return;
        self.entropy = info.mean_entropy;
        self.entropy_coef = info.entropy_coef;
        self
    }
}

/// Logger trait for different logging backends.
pub trait MetricsLogger: Send {
    fn log(&mut self, snapshot: &SvgSnapshot);

    /// Flush any buffered output.
    fn flush(&mut self);
}

// ============================================================================
// Console
// ============================================================================

pub struct ConsoleLogger {
    log_interval: usize,
    last_log_step: Option<usize>,
    show_header: bool,
}

impl ConsoleLogger {
    /// Print at most once every `log_interval` steps.
    pub fn new(log_interval: usize) -> Self {
        Self {
            log_interval: log_interval.max(1),
            last_log_step: None,
            show_header: true,
        }
    }

    fn due(&self, step: usize) -> bool {
        match self.last_log_step {
            None => true,
            Some(last) => step >= last + self.log_interval,
        }
    }

    fn print_header(&self) {
        println!(
            "{:>8} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10} {:>9} {:>9}",
            "Step", "EnvSteps", "Trans", "Reward", "Critic", "Policy", "Return", "Entropy", "Alpha"
        );
        println!("{}", "-".repeat(96));
    }
}

impl MetricsLogger for ConsoleLogger {
    fn log(&mut self, snapshot: &SvgSnapshot) {
        if !self.due(snapshot.step) {
            return;
        }
        if self.show_header {
            self.print_header();
            self.show_header = false;
        }

        println!(
            "{:>8} {:>10} {:>10.5} {:>10.5} {:>10.5} {:>10.4} {:>10.4} {:>9.4} {:>9.5}",
            snapshot.step,
            snapshot.env_steps,
            snapshot.transition_loss,
            snapshot.reward_loss,
            snapshot.critic_loss,
            snapshot.policy_loss,
            snapshot.imagined_return,
            snapshot.entropy,
            snapshot.entropy_coef,
        );
        self.last_log_step = Some(snapshot.step);
    }

    fn flush(&mut self) {}
}

// ============================================================================
// CSV
// ============================================================================

const CSV_HEADER: &str = "step,env_steps,transition_loss,reward_loss,critic_loss,policy_loss,imagined_return,entropy,entropy_coef,elapsed_secs";

pub struct CsvLogger {
    writer: BufWriter<File>,
    start_time: Instant,
}

impl CsvLogger {
    /// Create the file at `path` and write the header row.
    pub fn new(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "{}", CSV_HEADER)?;

        Ok(Self {
            writer,
            start_time: Instant::now(),
        })
    }
}

impl MetricsLogger for CsvLogger {
    fn log(&mut self, snapshot: &SvgSnapshot) {
        let elapsed = self.start_time.elapsed().as_secs_f32();
        if let Err(err) = writeln!(
            self.writer,
            "{},{},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.8},{:.2}",
            snapshot.step,
            snapshot.env_steps,
            snapshot.transition_loss,
            snapshot.reward_loss,
            snapshot.critic_loss,
            snapshot.policy_loss,
            snapshot.imagined_return,
            snapshot.entropy,
            snapshot.entropy_coef,
            elapsed,
        ) {
            log::warn!("Failed to write CSV row for step {}: {}", snapshot.step, err);
        }
    }

    fn flush(&mut self) {
        if let Err(err) = self.writer.flush() {
            log::warn!("Failed to flush CSV logger: {}", err);
        }
    }
}

impl Drop for CsvLogger {
    fn drop(&mut self) {
        self.flush();
    }
}

// ============================================================================
// Fan-out
// ============================================================================

#[derive(Default)]
pub struct MultiLogger {
    loggers: Vec<Box<dyn MetricsLogger>>,
}

impl MultiLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<L: MetricsLogger + 'static>(mut self, logger: L) -> Self {
        self.loggers.push(Box::new(logger));
        self
    }

    pub fn len(&self) -> usize {
        self.loggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loggers.is_empty()
    }
}

impl MetricsLogger for MultiLogger {
    fn log(&mut self, snapshot: &SvgSnapshot) {
        for logger in &mut self.loggers {
            logger.log(snapshot);
        }
    }

    fn flush(&mut self) {
        for logger in &mut self.loggers {
            logger.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> SvgStepInfo {
        SvgStepInfo {
            transition_loss: 0.25,
            reward_loss: 0.5,
            critic_loss: 1.5,
            policy_loss: -3.0,
            mean_return: 3.0,
            mean_entropy: 0.75,
            entropy_coef: 0.001,
        }
    }

    #[test]
    fn test_snapshot_from_step_info() {
        let snapshot = SvgSnapshot::from_step_info(10, 200, &info());
        assert_eq!(snapshot.step, 10);
        assert_eq!(snapshot.env_steps, 200);
        assert_eq!(snapshot.critic_loss, 1.5);
        assert_eq!(snapshot.imagined_return, 3.0);
        assert_eq!(snapshot.entropy, 0.75);
        assert_eq!(snapshot.entropy_coef, 0.001);
    }

    #[test]
    fn test_console_logger_interval() {
        let mut logger = ConsoleLogger::new(10);
        assert!(logger.due(0));
        logger.log(&SvgSnapshot::new(0, 0));
        assert!(!logger.due(5));
        assert!(logger.due(10));
    }

    #[test]
    fn test_csv_logger_writes_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("svg.csv");

        {
            let mut logger = CsvLogger::new(&path).unwrap();
            logger.log(&SvgSnapshot::from_step_info(1, 32, &info()));
            logger.log(&SvgSnapshot::from_step_info(2, 64, &info()));
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER);
        assert!(lines[1].starts_with("1,32,0.250000,0.500000,1.500000,-3.000000,3.000000,0.750000,"));
        assert_eq!(lines[2].split(',').count(), CSV_HEADER.split(',').count());
    }

    #[test]
    fn test_multi_logger_fans_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("multi.csv");

        let mut multi = MultiLogger::new()
            .add(ConsoleLogger::new(1))
            .add(CsvLogger::new(&path).unwrap());
        assert_eq!(multi.len(), 2);

        multi.log(&SvgSnapshot::from_step_info(3, 96, &info()));
        multi.flush();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }
}
