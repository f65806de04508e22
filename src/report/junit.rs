use super::model::{ReportStatus, ScenarioUpload};
use crate::runner::step_log::StepStatus;
use anyhow::Result;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;
use std::path::Path;

fn seconds(ms: u64) -> String {
    (ms as f64 / 1000.0).to_string()
}

fn failures(scenarios: &[&ScenarioUpload]) -> usize {
    scenarios
        .iter()
        .filter(|s| s.status == ReportStatus::Failed)
        .count()
}

/// Generate JUnit XML for a report: one `<testsuite>` per suite, one
/// `<testcase>` per scenario, in upload order.
pub fn generate_junit_xml(
    report_id: &str,
    scenarios: &[ScenarioUpload],
    generated_at: &str,
) -> Result<String> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let all: Vec<&ScenarioUpload> = scenarios.iter().collect();
    let total_ms: u64 = scenarios.iter().map(|s| s.duration_ms).sum();

    let mut suites_start = BytesStart::new("testsuites");
    suites_start.push_attribute(("name", report_id));
    suites_start.push_attribute(("tests", scenarios.len().to_string().as_str()));
    suites_start.push_attribute(("failures", failures(&all).to_string().as_str()));
    suites_start.push_attribute(("time", seconds(total_ms).as_str()));
    writer.write_event(Event::Start(suites_start))?;

    let mut suite_names: Vec<&str> = Vec::new();
    for s in scenarios {
        if !suite_names.contains(&s.suite.as_str()) {
            suite_names.push(&s.suite);
        }
    }

    for suite in suite_names {
        let cases: Vec<&ScenarioUpload> = scenarios.iter().filter(|s| s.suite == suite).collect();
        let suite_ms: u64 = cases.iter().map(|s| s.duration_ms).sum();

        let mut suite_start = BytesStart::new("testsuite");
        suite_start.push_attribute(("name", suite));
        suite_start.push_attribute(("tests", cases.len().to_string().as_str()));
        suite_start.push_attribute(("failures", failures(&cases).to_string().as_str()));
        suite_start.push_attribute(("time", seconds(suite_ms).as_str()));
        suite_start.push_attribute(("timestamp", generated_at));
        writer.write_event(Event::Start(suite_start))?;

        for case in cases {
            write_test_case(&mut writer, case)?;
        }

        writer.write_event(Event::End(BytesEnd::new("testsuite")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("testsuites")))?;

    let xml = String::from_utf8(writer.into_inner().into_inner())?;
    Ok(xml)
}

fn write_test_case<W: std::io::Write>(writer: &mut Writer<W>, case: &ScenarioUpload) -> Result<()> {
    let mut case_start = BytesStart::new("testcase");
    case_start.push_attribute(("name", case.scenario.as_str()));
    case_start.push_attribute(("classname", case.suite.as_str()));
    case_start.push_attribute(("time", seconds(case.duration_ms).as_str()));
    writer.write_event(Event::Start(case_start))?;

    if case.status == ReportStatus::Failed {
        let failed: Vec<&str> = case
            .steps
            .iter()
            .filter(|s| s.status == StepStatus::Failed)
            .map(|s| s.message.as_str())
            .collect();
        let first = failed.first().copied().unwrap_or("Scenario failed");

        let mut fail_start = BytesStart::new("failure");
        fail_start.push_attribute(("message", first));
        fail_start.push_attribute(("type", "ActionFailure"));
        writer.write_event(Event::Start(fail_start))?;
        writer.write_event(Event::Text(BytesText::new(&failed.join("\n"))))?;
        writer.write_event(Event::End(BytesEnd::new("failure")))?;
    }

    // The narrative goes to system-out so CI viewers show the whole scenario
    let narrative: Vec<String> = case
        .steps
        .iter()
        .map(|s| format!("{} {} [{:?}]", s.keyword, s.message, s.status))
        .collect();
    if !narrative.is_empty() {
        writer.write_event(Event::Start(BytesStart::new("system-out")))?;
        writer.write_event(Event::Text(BytesText::new(&narrative.join("\n"))))?;
        writer.write_event(Event::End(BytesEnd::new("system-out")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("testcase")))?;
    Ok(())
}

/// Write `junit.xml` into `output_dir`
pub fn write_report(
    report_id: &str,
    scenarios: &[ScenarioUpload],
    generated_at: &str,
    output_dir: &Path,
) -> Result<()> {
    let xml = generate_junit_xml(report_id, scenarios, generated_at)?;
    let path = output_dir.join("junit.xml");
    std::fs::write(&path, xml)?;
    log::info!("Generated JUnit report: {}", path.display());
    Ok(())
}
