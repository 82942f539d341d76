use devs::{
    logger, AtomicBehavior, AtomicModel, CoupledModel, Outbox, Simulation, SimulationConfig, Time,
};

#[derive(Debug, Clone)]
struct Beep;

impl AtomicBehavior<&'static str> for Beep {
    fn output(&self, outbox: &mut Outbox<'_, &'static str>) -> devs::Result<()> {
        outbox.post("out", "beep")
    }
    fn time_advance(&self) -> Time {
        4.0
    }
}

#[test]
fn test_logger() -> eyre::Result<()> {
    logger::LoggerBuilder::default()
        .level(log::LevelFilter::Info)
        .target("devs")
        .init()?;
    log::warn!(target: "other", "Ignored");
    log::info!(target: "devs::test", "Info");
    log::debug!(target: "devs::test", "Debug");
    assert_eq!(logger::clear()?, vec![String::from("[INFO]  Info")]);

    let mut root = CoupledModel::new("root");
    root.add_child(AtomicModel::new("beeper", Beep).with_output_port("out"))?;
    root.add_external_output_coupling("beeper", Some("out"), Some("out"))?;
    let mut simulation = Simulation::new(root, SimulationConfig::default().with_duration(10.0))?;
    simulation.simulate()?;
    let logs = logger::clear()?;
    let outputs: Vec<&str> = logs
        .iter()
        .filter(|line| line.contains("output at"))
        .map(String::as_str)
        .collect();
    assert_eq!(
        outputs,
        vec![
            r#"[INFO]  output at 4: "beep"@out"#,
            r#"[INFO]  output at 8: "beep"@out"#,
        ]
    );
    assert!(logs[0].starts_with("[INFO]  starting classic simulation of `root`"));
    assert!(logger::clear()?.is_empty());
    Ok(())
}
