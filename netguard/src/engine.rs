//! Capture engine: drains a capture source into a sink.

use netguard_capture::{classify, CaptureSource, Frame, Next};
use netguard_schema::NewRecord;
use netguard_store::Sink;
use serde::Serialize;

use crate::logger::Logger;
use crate::signal::ShutdownCheck;

/// Consecutive read errors after which the source is treated as gone.
pub const MAX_CONSECUTIVE_READ_ERRORS: u32 = 100;

/// Counters for one capture session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineReport {
    /// Frames handed over by the source.
    pub frames_seen: u64,
    pub records_written: u64,
    /// Frames without an IPv4 layer.
    pub non_ip_skipped: u64,
    /// Frames that could not be decoded or turned into a record.
    pub frame_failures: u64,
    /// Records lost because the sink write failed after its retry.
    pub writes_dropped: u64,
    pub read_errors: u64,
    pub timeouts: u64,
}

/// Outcome of handling one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameOutcome {
    Written,
    NotIp,
    Failed,
    Dropped,
}

fn process_frame<K, L>(frame: &Frame, sink: &mut K, logger: &L) -> FrameOutcome
where
    K: Sink + ?Sized,
    L: Logger + ?Sized,
{
    let layers = match frame.decode() {
        Ok(layers) => layers,
        Err(e) => {
            logger.warn(&format!("skipping malformed frame: {}", e));
            return FrameOutcome::Failed;
        }
    };

    let Some(class) = classify(&layers) else {
        return FrameOutcome::NotIp;
    };

    let record = match NewRecord::with_protocol(
        &class.src.to_string(),
        &class.dst.to_string(),
        class.protocol,
        frame.captured_len() as u64,
        &class.flags,
    ) {
        Ok(record) => record,
        Err(e) => {
            logger.warn(&format!("skipping frame: {}", e));
            return FrameOutcome::Failed;
        }
    };

    match sink.write(&record) {
        Ok(_) => FrameOutcome::Written,
        Err(e) => {
            logger.warn(&format!(
                "dropped {} record {} -> {}: {}",
                record.protocol(),
                record.src_ip(),
                record.dst_ip(),
                e
            ));
            FrameOutcome::Dropped
        }
    }
}

/// Run the capture loop until `cancel` fires or the source closes.
///
/// Blocks the calling thread. `cancel` is checked once after every poll of
/// the source, so shutdown latency is bounded by the source's poll timeout.
/// No single frame or write failure ends the loop. The sink is closed on exit.
pub fn run<S, K, H, L>(source: &mut S, sink: &mut K, cancel: &H, logger: &L) -> EngineReport
where
    S: CaptureSource + ?Sized,
    K: Sink + ?Sized,
    H: ShutdownCheck + ?Sized,
    L: Logger + ?Sized,
{
    let mut report = EngineReport::default();
    let mut consecutive_errors: u32 = 0;

    logger.info(&format!("capture started on {}", source.describe()));

    loop {
        match source.next_frame() {
            Ok(Next::Frame(frame)) => {
                consecutive_errors = 0;
                report.frames_seen += 1;
                match process_frame(&frame, sink, logger) {
                    FrameOutcome::Written => report.records_written += 1,
                    FrameOutcome::NotIp => report.non_ip_skipped += 1,
                    FrameOutcome::Failed => report.frame_failures += 1,
                    FrameOutcome::Dropped => report.writes_dropped += 1,
                }
            }
            Ok(Next::Timeout) => {
                consecutive_errors = 0;
                report.timeouts += 1;
            }
            Ok(Next::Closed) => {
                logger.info(&format!("capture source {} closed", source.describe()));
                break;
            }
            Err(e) => {
                report.read_errors += 1;
                consecutive_errors += 1;
                if consecutive_errors >= MAX_CONSECUTIVE_READ_ERRORS {
                    logger.error(&format!(
                        "giving up on {} after {} consecutive read errors: {}",
                        source.describe(),
                        consecutive_errors,
                        e
                    ));
                    break;
                }
                logger.warn(&format!("{}", e));
            }
        }

        if cancel.should_stop() {
            break;
        }
    }

    sink.close();
    logger.info(&format!(
        "capture stopped: frames={} written={} non_ip={} failures={} dropped={}",
        report.frames_seen,
        report.records_written,
        report.non_ip_skipped,
        report.frame_failures,
        report.writes_dropped
    ));

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::{Level, MockLogger, NullLogger};
    use crate::signal::{AlwaysShutdown, NeverShutdown, ShutdownFlag};
    use netguard_capture::synth::{self, ACK, SYN};
    use netguard_capture::{LinkType, ScriptStep, ScriptedSource};
    use netguard_clock::MockClock;
    use netguard_schema::Protocol;
    use netguard_stats::summary;
    use netguard_store::{MockSink, RecordReader, SqliteSink};

    fn truncated_ipv4() -> Frame {
        let mut frame = synth::tcp_frame("10.0.0.1", "10.0.0.2", SYN);
        frame.data.truncate(14 + 10);
        frame.wire_len = frame.data.len() as u32;
        frame
    }

    // ===========================================
    // Classification into records
    // ===========================================

    #[test]
    fn test_one_record_per_ip_frame() {
        let mut source = ScriptedSource::from_frames(vec![
            synth::tcp_frame("10.0.0.1", "10.0.0.9", SYN | ACK),
            synth::udp_frame("10.0.0.2", "10.0.0.9"),
            synth::icmp_frame("10.0.0.3", "10.0.0.9"),
            synth::arp_frame(),
        ]);
        let sink = MockSink::new();
        let mut handle = sink.clone();

        let report = run(&mut source, &mut handle, &NeverShutdown, &NullLogger);

        assert_eq!(report.frames_seen, 4);
        assert_eq!(report.records_written, 3);
        assert_eq!(report.non_ip_skipped, 1);

        let written = sink.written();
        assert_eq!(written.len(), 3);
        assert_eq!(written[0].protocol(), Protocol::Tcp);
        assert_eq!(written[0].flags(), "SA");
        assert_eq!(written[0].src_ip(), "10.0.0.1");
        assert_eq!(written[1].protocol(), Protocol::Udp);
        assert_eq!(written[1].flags(), "");
        assert_eq!(written[2].protocol(), Protocol::Other);
        assert_eq!(written[2].dst_ip(), "10.0.0.9");
    }

    #[test]
    fn test_length_is_captured_frame_size() {
        let frame = synth::udp_frame("10.0.0.2", "10.0.0.9");
        let expected = frame.captured_len() as u64;
        let mut source = ScriptedSource::from_frames(vec![frame]);
        let sink = MockSink::new();

        run(&mut source, &mut sink.clone(), &NeverShutdown, &NullLogger);

        assert_eq!(sink.written()[0].length(), expected);
    }

    #[test]
    fn test_store_counts_after_capture() {
        let mut source = ScriptedSource::from_frames(vec![
            synth::tcp_frame("10.0.0.1", "10.0.0.9", SYN),
            synth::tcp_frame("10.0.0.1", "10.0.0.9", ACK),
            synth::udp_frame("10.0.0.2", "10.0.0.9"),
        ]);
        let dir = tempfile::TempDir::new().expect("tempdir");
        let config = netguard_store::StoreConfig {
            data_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let mut writer = SqliteSink::connect(&config, MockClock::new(1000)).expect("writer");

        run(&mut source, &mut writer, &NeverShutdown, &NullLogger);

        let reader = SqliteSink::connect(&config, MockClock::new(1000)).expect("reader");
        let counts = summary(&reader).expect("summary");
        assert_eq!(counts.total, 3);
        assert_eq!(counts.tcp, 2);
        assert_eq!(counts.udp, 1);
        assert_eq!(reader.recent(1).expect("recent")[0].src_ip, "10.0.0.2");
    }

    // ===========================================
    // Failure handling
    // ===========================================

    #[test]
    fn test_malformed_frame_does_not_end_session() {
        let mut source = ScriptedSource::from_frames(vec![
            truncated_ipv4(),
            Frame::new(LinkType::Ethernet, vec![0u8; 4]),
            synth::udp_frame("10.0.0.2", "10.0.0.9"),
        ]);
        let sink = MockSink::new();
        let logger = MockLogger::new();

        let report = run(&mut source, &mut sink.clone(), &NeverShutdown, &logger);

        assert_eq!(report.frame_failures, 2);
        assert_eq!(report.records_written, 1);
        assert_eq!(logger.messages_at_level(Level::Warn).len(), 2);
        assert!(logger.contains("skipping malformed frame"));
    }

    #[test]
    fn test_write_outage_drops_and_resumes() {
        let frames: Vec<Frame> = (0..5)
            .map(|i| synth::tcp_frame(&format!("10.0.0.{}", i), "10.0.0.9", SYN))
            .collect();
        let mut source = ScriptedSource::from_frames(frames);
        let sink = MockSink::new();
        sink.fail_next(2);
        let logger = MockLogger::new();

        let report = run(&mut source, &mut sink.clone(), &NeverShutdown, &logger);

        assert_eq!(report.writes_dropped, 2);
        assert_eq!(report.records_written, 3);
        assert_eq!(sink.attempts(), 5);
        let written: Vec<String> = sink.written().iter().map(|r| r.src_ip().to_string()).collect();
        assert_eq!(written, vec!["10.0.0.2", "10.0.0.3", "10.0.0.4"]);
        assert!(logger.contains("dropped TCP record 10.0.0.0 -> 10.0.0.9"));
    }

    #[test]
    fn test_read_errors_are_logged_and_skipped() {
        let mut source = ScriptedSource::new(vec![
            ScriptStep::Error("interface flapped".to_string()),
            ScriptStep::Frame(synth::udp_frame("10.0.0.2", "10.0.0.9")),
        ]);
        let sink = MockSink::new();
        let logger = MockLogger::new();

        let report = run(&mut source, &mut sink.clone(), &NeverShutdown, &logger);

        assert_eq!(report.read_errors, 1);
        assert_eq!(report.records_written, 1);
        assert!(logger.contains("interface flapped"));
    }

    #[test]
    fn test_persistent_read_errors_end_session() {
        let steps = (0..MAX_CONSECUTIVE_READ_ERRORS + 10)
            .map(|_| ScriptStep::Error("gone".to_string()))
            .collect();
        let mut source = ScriptedSource::new(steps).idle_after(std::time::Duration::from_millis(1));
        let sink = MockSink::new();
        let logger = MockLogger::new();

        let report = run(&mut source, &mut sink.clone(), &NeverShutdown, &logger);

        assert_eq!(report.read_errors, MAX_CONSECUTIVE_READ_ERRORS as u64);
        assert_eq!(logger.messages_at_level(Level::Error).len(), 1);
        assert_eq!(sink.close_calls(), 1);
    }

    // ===========================================
    // Cancellation
    // ===========================================

    #[test]
    fn test_cancel_checked_after_each_poll() {
        let mut source = ScriptedSource::from_frames(vec![
            synth::udp_frame("10.0.0.1", "10.0.0.9"),
            synth::udp_frame("10.0.0.2", "10.0.0.9"),
        ]);
        let sink = MockSink::new();

        let report = run(&mut source, &mut sink.clone(), &AlwaysShutdown, &NullLogger);

        assert_eq!(report.frames_seen, 1);
        assert_eq!(source.remaining(), 1);
        assert_eq!(sink.close_calls(), 1);
    }

    #[test]
    fn test_cancel_observed_on_timeout() {
        let mut source = ScriptedSource::new(vec![ScriptStep::Timeout, ScriptStep::Timeout]);
        let flag = ShutdownFlag::manual();
        flag.trigger();

        let report = run(&mut source, &mut MockSink::new(), &flag, &NullLogger);

        assert_eq!(report.timeouts, 1);
        assert_eq!(report.frames_seen, 0);
    }

    #[test]
    fn test_closes_sink_when_source_closes() {
        let mut source = ScriptedSource::new(Vec::new());
        let sink = MockSink::new();
        let logger = MockLogger::new();

        run(&mut source, &mut sink.clone(), &NeverShutdown, &logger);

        assert_eq!(sink.close_calls(), 1);
        assert!(!netguard_store::Sink::is_open(&sink));
        assert!(logger.contains("capture started on scripted"));
        assert!(logger.contains("capture stopped"));
    }
}
