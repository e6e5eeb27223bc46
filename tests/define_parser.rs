mod common;
use crate::common::{TestResult, init_tracing};

use std::ops::ControlFlow;

use wmlkit::parse::{ParseError, collect_defines, collect_ids, find_first_id, stream_defines};

const TWO_DEFINES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<root>
  <preproc_define>
    <name>UNIT_HEAL</name>
    <value>{AMOUNT} &lt;heals&gt;</value>
    <textdomain>wesnoth-help</textdomain>
    <linenum>12</linenum>
    <location>data/core/macros/abilities.cfg</location>
    <argument><name>AMOUNT</name></argument>
  </preproc_define>
  <preproc_define>
    <name>QUANTITY</name>
    <value>x</value>
    <textdomain>wesnoth</textdomain>
    <linenum>3</linenum>
    <location>data/core/macros/utils.cfg</location>
    <argument><name>NAME</name></argument>
    <argument><name>EASY</name></argument>
  </preproc_define>
</root>
"#;

#[tokio::test]
async fn collects_records_with_arguments() -> TestResult {
    init_tracing();

    let (table, summary) = collect_defines(TWO_DEFINES.as_bytes()).await?;
    assert_eq!(table.len(), 2);
    assert_eq!(summary.committed, 2);
    assert_eq!(summary.rejected, 0);
    assert!(!summary.stopped_early);

    let heal = table.get("UNIT_HEAL").expect("UNIT_HEAL parsed");
    assert_eq!(heal.value, "{AMOUNT} <heals>");
    assert_eq!(heal.textdomain, "wesnoth-help");
    assert_eq!(heal.line, 12);
    assert_eq!(heal.location, "data/core/macros/abilities.cfg");
    assert_eq!(heal.arguments, vec!["AMOUNT"]);

    let quantity = table.get("QUANTITY").expect("QUANTITY parsed");
    assert_eq!(quantity.arguments, vec!["NAME", "EASY"]);
    assert_eq!(table.names(), vec!["QUANTITY", "UNIT_HEAL"]);

    Ok(())
}

#[tokio::test]
async fn argument_names_do_not_leak_into_define_name() -> TestResult {
    init_tracing();

    let xml = r#"<preproc_define>
        <argument><name>ARG</name></argument>
        <name>LATE_NAME</name>
        <linenum>1</linenum>
    </preproc_define>"#;

    let (table, _) = collect_defines(xml.as_bytes()).await?;
    let define = table.get("LATE_NAME").expect("named after the record-level name");
    assert_eq!(define.arguments, vec!["ARG"]);

    Ok(())
}

#[tokio::test]
async fn malformed_line_number_drops_only_that_record() -> TestResult {
    init_tracing();

    let xml = r#"<root>
      <preproc_define><name>BAD</name><linenum>twelve</linenum></preproc_define>
      <preproc_define><name>GOOD</name><linenum>7</linenum></preproc_define>
      <preproc_define><name>NO_LINE</name></preproc_define>
    </root>"#;

    let (table, summary) = collect_defines(xml.as_bytes()).await?;
    assert_eq!(summary.rejected, 1);
    assert_eq!(summary.committed, 2);
    assert!(!table.contains("BAD"));
    assert_eq!(table.get("GOOD").map(|d| d.line), Some(7));
    assert_eq!(table.get("NO_LINE").map(|d| d.line), Some(0));

    Ok(())
}

#[tokio::test]
async fn later_record_with_same_name_wins() -> TestResult {
    init_tracing();

    let xml = r#"<root>
      <preproc_define><name>DUP</name><value>first</value><linenum>1</linenum></preproc_define>
      <preproc_define><name>DUP</name><value>second</value><linenum>2</linenum></preproc_define>
    </root>"#;

    let (table, summary) = collect_defines(xml.as_bytes()).await?;
    assert_eq!(summary.committed, 2);
    assert_eq!(table.len(), 1);
    let dup = table.get("DUP").expect("DUP parsed");
    assert_eq!(dup.value, "second");
    assert_eq!(dup.line, 2);

    Ok(())
}

#[tokio::test]
async fn sink_sees_records_in_order_and_can_stop_early() -> TestResult {
    init_tracing();

    let mut seen = Vec::new();
    let summary = stream_defines(TWO_DEFINES.as_bytes(), |define| {
        seen.push(define.name);
        ControlFlow::Break(())
    })
    .await?;

    assert_eq!(seen, vec!["UNIT_HEAL"]);
    assert!(summary.stopped_early);
    assert_eq!(summary.committed, 1);

    Ok(())
}

#[tokio::test]
async fn broken_stream_is_an_xml_error() {
    init_tracing();

    let xml = "<root><preproc_define><name>X</name></wrong></root>";
    match collect_defines(xml.as_bytes()).await {
        Err(ParseError::Xml { .. }) => {}
        other => panic!("expected Xml error, got {other:?}"),
    }
}

const CAMPAIGN: &str = r#"<root>
  <campaign>
    <name>The Journey</name>
    <side><id>Hero</id></side>
    <id>journey_campaign</id>
  </campaign>
  <campaign id="second_campaign"><name>Two</name></campaign>
  <scenario><id>01_Start</id></scenario>
  <scenario id="02_Middle"/>
</root>"#;

#[tokio::test]
async fn first_campaign_id_ignores_nested_ids() -> TestResult {
    init_tracing();

    let id = find_first_id(CAMPAIGN.as_bytes(), "campaign").await?;
    assert_eq!(id.as_deref(), Some("journey_campaign"));

    Ok(())
}

#[tokio::test]
async fn collects_ids_from_children_and_attributes() -> TestResult {
    init_tracing();

    let campaigns = collect_ids(CAMPAIGN.as_bytes(), "campaign").await?;
    assert_eq!(campaigns, vec!["journey_campaign", "second_campaign"]);

    let scenarios = collect_ids(CAMPAIGN.as_bytes(), "scenario").await?;
    assert_eq!(scenarios, vec!["01_Start", "02_Middle"]);

    Ok(())
}

#[tokio::test]
async fn missing_campaign_yields_none() -> TestResult {
    init_tracing();

    let id = find_first_id("<root><scenario><id>x</id></scenario></root>".as_bytes(), "campaign").await?;
    assert_eq!(id, None);

    Ok(())
}
