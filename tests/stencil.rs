use camino::Utf8PathBuf;
use indexmap::IndexMap;
use scl_stencil::SclDocument;
use scl_stencil::discovery::{DiscoveryOptions, discover_pairs};
use scl_stencil::matcher::{MatchOptions, find_control_block_subscriptions, is_subscribed};
use scl_stencil::model::{ControlBlockInfo, StencilData};
use scl_stencil::stencil::{
    ApplicationMeta, ApplyError, ApplyOptions, ExcludedControlBlock, FunctionBinding, Stage,
    StencilApplication, apply_stencil, candidate_ieds,
};
use scl_stencil::supervision::find_supervision;

/// A wired template bay (P1 → P2, S1) and an unwired copy (P3, P4, S2).
const SUBSTATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<SCL xmlns="http://www.iec.ch/61850/2003/SCL" version="2007" revision="B">
  <Header id="substation"/>
  <IED name="P1" manufacturer="ACME" type="Relay" desc="Template relay">
    <Private type="OpenSCD-Stencil-Id">relay-std</Private>
    <Private type="OpenSCD-Stencil-Version">2.1</Private>
    <AccessPoint name="AP1"><Server>
      <LDevice inst="CTRL">
        <LN0 lnClass="LLN0" inst="" lnType="LLN0_T">
          <DataSet name="ds1">
            <FCDA ldInst="CTRL" lnClass="XCBR" lnInst="1" doName="Pos" daName="stVal" fc="ST"/>
            <FCDA ldInst="CTRL" lnClass="XCBR" lnInst="1" doName="Pos" daName="q" fc="ST"/>
          </DataSet>
          <GSEControl name="gcb01" datSet="ds1"/>
        </LN0>
      </LDevice>
    </Server></AccessPoint>
  </IED>
  <IED name="P2" manufacturer="ACME" type="Breaker">
    <AccessPoint name="AP1"><Server>
      <LDevice inst="PROT">
        <LN0 lnClass="LLN0" inst="" lnType="LLN0_T">
          <Inputs>
            <ExtRef intAddr="Pos.stVal" iedName="P1" serviceType="GOOSE" ldInst="CTRL" lnClass="XCBR" lnInst="1" doName="Pos" daName="stVal" srcLDInst="CTRL" srcLNClass="LLN0" srcCBName="gcb01"/>
            <ExtRef intAddr="Pos.q" iedName="P1" serviceType="GOOSE" ldInst="CTRL" lnClass="XCBR" lnInst="1" doName="Pos" daName="q" srcLDInst="CTRL" srcLNClass="LLN0" srcCBName="gcb01"/>
          </Inputs>
        </LN0>
      </LDevice>
      <LDevice inst="SUP">
        <LN0 lnClass="LLN0" inst="" lnType="LLN0_T"/>
        <LN lnClass="LGOS" inst="1" lnType="LGOS_T">
          <DOI name="GoCBRef"><DAI name="setSrcRef" valKind="RO" valImport="true"><Val>P1CTRL/LLN0.gcb01</Val></DAI></DOI>
        </LN>
      </LDevice>
    </Server></AccessPoint>
  </IED>
  <IED name="S1" manufacturer="SEL" type="SEL-451">
    <AccessPoint name="AP1"><Server>
      <LDevice inst="CFG">
        <LN0 lnClass="LLN0" inst="" lnType="LLN0_T">
          <Inputs>
            <ExtRef intAddr="GOOSE_Q1" iedName="P1" srcLDInst="CTRL" srcLNClass="LLN0" srcCBName="gcb01"/>
          </Inputs>
        </LN0>
      </LDevice>
    </Server></AccessPoint>
  </IED>
  <IED name="P3" manufacturer="ACME" type="Relay">
    <AccessPoint name="AP1"><Server>
      <LDevice inst="CTRL">
        <LN0 lnClass="LLN0" inst="" lnType="LLN0_T">
          <DataSet name="ds1">
            <FCDA ldInst="CTRL" lnClass="XCBR" lnInst="1" doName="Pos" daName="stVal" fc="ST"/>
            <FCDA ldInst="CTRL" lnClass="XCBR" lnInst="1" doName="Pos" daName="q" fc="ST"/>
          </DataSet>
          <GSEControl name="gcb01" datSet="ds1"/>
        </LN0>
      </LDevice>
    </Server></AccessPoint>
  </IED>
  <IED name="P4" manufacturer="ACME" type="Breaker">
    <AccessPoint name="AP1"><Server>
      <LDevice inst="PROT">
        <LN0 lnClass="LLN0" inst="" lnType="LLN0_T">
          <Inputs>
            <ExtRef intAddr="Pos.stVal"/>
            <ExtRef intAddr="Pos.q"/>
          </Inputs>
        </LN0>
      </LDevice>
      <LDevice inst="SUP">
        <LN0 lnClass="LLN0" inst="" lnType="LLN0_T"/>
        <LN lnClass="LGOS" inst="1" lnType="LGOS_T"/>
      </LDevice>
    </Server></AccessPoint>
  </IED>
  <IED name="S2" manufacturer="SEL" type="SEL-451">
    <AccessPoint name="AP1"><Server>
      <LDevice inst="CFG">
        <LN0 lnClass="LLN0" inst="" lnType="LLN0_T">
          <Inputs>
            <ExtRef intAddr="GOOSE_Q1"/>
          </Inputs>
        </LN0>
      </LDevice>
    </Server></AccessPoint>
  </IED>
</SCL>
"#;

fn template_ieds() -> Vec<String> {
    vec!["P1".to_string(), "P2".to_string(), "S1".to_string()]
}

fn functions() -> IndexMap<String, String> {
    [("P1", "Relay"), ("P2", "Breaker"), ("S1", "Monitor")]
        .into_iter()
        .map(|(ied, function)| (ied.to_string(), function.to_string()))
        .collect()
}

fn meta(version: &str) -> ApplicationMeta {
    ApplicationMeta {
        category: "Feeder".to_string(),
        name: "Breaker control".to_string(),
        description: "Breaker position to protection".to_string(),
        version: version.to_string(),
        version_description: String::new(),
        deprecated: false,
    }
}

fn captured(doc: &SclDocument) -> StencilData {
    let infos = discover_pairs(doc, &template_ieds(), &DiscoveryOptions::default()).unwrap();
    let mut stencil = StencilData::default();
    stencil
        .add_application(doc, &infos, &functions(), &[], &meta("1.0"))
        .unwrap();
    stencil
}

fn binding() -> FunctionBinding {
    [("Relay", "P3"), ("Breaker", "P4"), ("Monitor", "S2")]
        .into_iter()
        .collect()
}

fn gcb01(doc: &SclDocument, ied: &str) -> scl_stencil::ElementId {
    doc.descendants_by_tag(doc.ied(ied).unwrap(), "GSEControl")
        .next()
        .unwrap()
}

#[test]
fn capture_records_functions_and_requirements() {
    let doc = SclDocument::parse(SUBSTATION).unwrap();
    let stencil = captured(&doc);
    assert_eq!(stencil.name, "Noname");
    assert_eq!(stencil.version, "0.0.1");

    let app = stencil.find_version("Feeder", "Breaker control", "1.0").unwrap();
    assert_eq!(
        app.functions().collect::<Vec<_>>(),
        vec!["Breaker", "Relay", "Monitor"]
    );
    let relay = &app.ieds["Relay"];
    assert_eq!(relay.original_name, "P1");
    assert_eq!(relay.ied_type, "Relay");
    assert_eq!(relay.manufacturer, "ACME");
    assert_eq!(relay.privates[0].stencil_id, "relay-std");
    assert_eq!(relay.privates[0].stencil_version, "2.1");
    assert_eq!(app.ieds["Breaker"].privates[0].stencil_id, "No Stencil ID Found");
    assert_eq!(app.ieds["Breaker"].privates[0].stencil_version, "No Stencil Version Found");

    let directions: Vec<(&str, &str)> = app
        .control_blocks
        .iter()
        .map(|cb| (cb.from.as_str(), cb.to.as_str()))
        .collect();
    assert_eq!(directions, vec![("Relay", "Breaker"), ("Relay", "Monitor")]);
}

#[test]
fn capture_upserts_versions() {
    let doc = SclDocument::parse(SUBSTATION).unwrap();
    let infos = discover_pairs(&doc, &template_ieds(), &DiscoveryOptions::default()).unwrap();
    let mut stencil = captured(&doc);

    // same version replaces
    let excluded = vec![ExcludedControlBlock {
        id: ">>CTRL>LLN0>gcb01".to_string(),
        from: "P1".to_string(),
        to: "S1".to_string(),
    }];
    stencil
        .add_application(&doc, &infos, &functions(), &excluded, &meta("1.0"))
        .unwrap();
    assert_eq!(stencil.applications.len(), 1);
    assert_eq!(stencil.applications[0].versions.len(), 1);
    let app = &stencil.applications[0].versions[0];
    assert_eq!(app.control_blocks.len(), 1);
    assert!(!app.ieds.contains_key("Monitor"));

    // new version appends
    let mut deprecated = meta("2.0");
    deprecated.deprecated = true;
    stencil
        .add_application(&doc, &infos, &functions(), &[], &deprecated)
        .unwrap();
    assert_eq!(stencil.applications[0].versions.len(), 2);
    assert_eq!(stencil.applications(false)[0].1.len(), 1);
    assert_eq!(stencil.applications(true)[0].1.len(), 2);

    // new name starts a new application
    let mut other = meta("1.0");
    other.name = "Interlocking".to_string();
    stencil
        .add_application(&doc, &infos, &functions(), &[], &other)
        .unwrap();
    assert_eq!(stencil.applications.len(), 2);
}

#[test]
fn capture_requires_a_function_for_every_ied() {
    let doc = SclDocument::parse(SUBSTATION).unwrap();
    let infos = discover_pairs(&doc, &template_ieds(), &DiscoveryOptions::default()).unwrap();
    let mut partial = functions();
    partial.shift_remove("S1");
    let mut stencil = StencilData::default();
    let err = stencil
        .add_application(&doc, &infos, &partial, &[], &meta("1.0"))
        .unwrap_err();
    assert!(err.to_string().contains("S1"));
    assert!(stencil.applications.is_empty());

    let mut clash = functions();
    clash.insert("S1".to_string(), "Relay".to_string());
    assert!(
        stencil
            .add_application(&doc, &infos, &clash, &[], &meta("1.0"))
            .is_err()
    );
}

#[test]
fn stencil_file_round_trip() {
    let doc = SclDocument::parse(SUBSTATION).unwrap();
    let mut stencil = captured(&doc);
    stencil.name = "Bay templates".to_string();

    let tmp = tempfile::tempdir().unwrap();
    let dir = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).unwrap();
    let path = dir.join(stencil.file_name());
    assert!(path.as_str().ends_with("Bay_templates_0.0.1.json"));
    stencil.save(&path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("\"IEDS\""));
    assert!(text.contains("\"ControlBlocks\""));
    assert!(text.contains("\"SELMessageQuality\": \"GOOSE_Q1\""));
    assert!(text.contains("\"originalName\": \"P1\""));

    let loaded = StencilData::load(&path).unwrap();
    assert_eq!(loaded, stencil);
}

#[test]
fn candidates_match_type_and_manufacturer() {
    let doc = SclDocument::parse(SUBSTATION).unwrap();
    let stencil = captured(&doc);
    let app = stencil.find_version("Feeder", "Breaker control", "1.0").unwrap();
    let names = |function: &str| -> Vec<String> {
        candidate_ieds(&doc, &app.ieds[function])
            .into_iter()
            .map(|ied| doc.attribute_or_empty(ied, "name").to_string())
            .collect()
    };
    assert_eq!(names("Relay"), vec!["P1", "P3"]);
    assert_eq!(names("Breaker"), vec!["P2", "P4"]);
    assert_eq!(names("Monitor"), vec!["S1", "S2"]);
}

#[test]
fn apply_rewires_the_unwired_bay() {
    let mut doc = SclDocument::parse(SUBSTATION).unwrap();
    let stencil = captured(&doc);
    let app = stencil.find_version("Feeder", "Breaker control", "1.0").unwrap();

    let report = apply_stencil(&mut doc, app, &binding(), &ApplyOptions::default());
    assert!(report.errors.is_empty(), "{:?}", report.errors);
    assert_eq!(report.subscriptions, 2);
    assert_eq!(report.supervisions, 1);
    assert_eq!(report.quality_links, 1);
    assert_eq!(report.summary(), "2 subscriptions and 1 supervisions done");

    let cb = gcb01(&doc, "P3");
    let subscribers = find_control_block_subscriptions(&doc, cb, &MatchOptions::strict());
    assert_eq!(subscribers.len(), 2);
    for ext_ref in &subscribers {
        assert!(is_subscribed(&doc, *ext_ref));
        assert_eq!(doc.ied_name_of(*ext_ref), Some("P4"));
        assert_eq!(doc.attribute(*ext_ref, "iedName"), Some("P3"));
    }

    let p4 = doc.ied("P4").unwrap();
    let lgos = find_supervision(&doc, cb, p4).unwrap();
    assert_eq!(doc.attribute(lgos, "inst"), Some("1"));

    let quality = doc
        .descendants_by_tag(doc.ied("S2").unwrap(), "ExtRef")
        .next()
        .unwrap();
    assert_eq!(doc.attribute(quality, "iedName"), Some("P3"));
    assert_eq!(doc.attribute(quality, "srcCBName"), Some("gcb01"));
    assert_eq!(doc.attribute(quality, "srcLDInst"), Some("CTRL"));
    assert_eq!(doc.attribute(quality, "srcLNClass"), Some("LLN0"));
    assert!(!doc.has_attribute(quality, "srcPrefix"));
    assert!(!is_subscribed(&doc, quality));

    // the template bay is untouched
    let template = gcb01(&doc, "P1");
    assert_eq!(
        find_control_block_subscriptions(&doc, template, &MatchOptions::strict()).len(),
        2
    );
}

#[test]
fn applied_document_survives_a_save() {
    let mut doc = SclDocument::parse(SUBSTATION).unwrap();
    let stencil = captured(&doc);
    let app = stencil.find_version("Feeder", "Breaker control", "1.0").unwrap();
    apply_stencil(&mut doc, app, &binding(), &ApplyOptions::default());

    let file = tempfile::NamedTempFile::new().unwrap();
    let path = Utf8PathBuf::from_path_buf(file.path().to_path_buf()).unwrap();
    doc.save(&path).unwrap();
    let reloaded = SclDocument::from_path(&path).unwrap();

    // the reloaded document yields the same mappings for the new bay
    let functions: IndexMap<String, String> = [("P3", "Relay"), ("P4", "Breaker"), ("S2", "Monitor")]
        .into_iter()
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .collect();
    let names: Vec<String> = functions.keys().cloned().collect();
    let infos = discover_pairs(&reloaded, &names, &DiscoveryOptions::default()).unwrap();
    let mut recaptured = StencilData::default();
    recaptured
        .add_application(&reloaded, &infos, &functions, &[], &meta("1.0"))
        .unwrap();
    let again = recaptured.find_version("Feeder", "Breaker control", "1.0").unwrap();
    assert_eq!(again.control_blocks, app.control_blocks);
}

#[test]
fn unresolvable_control_block_is_reported_and_skipped() {
    let mut doc = SclDocument::parse(SUBSTATION).unwrap();
    let stencil = captured(&doc);
    let mut app = stencil
        .find_version("Feeder", "Breaker control", "1.0")
        .unwrap()
        .clone();
    app.control_blocks.push(ControlBlockInfo {
        id: ">>CTRL>LLN0>gcb99".to_string(),
        name: "gcb99".to_string(),
        ..app.control_blocks[0].clone()
    });

    let report = apply_stencil(&mut doc, &app, &binding(), &ApplyOptions::default());
    assert_eq!(report.subscriptions, 2);
    assert_eq!(
        report.errors,
        vec![ApplyError::MissingControlBlock("P3>>CTRL>LLN0>gcb99".to_string())]
    );
    assert_eq!(report.errors[0].to_string(), "Could not find CB: P3>>CTRL>LLN0>gcb99");
}

#[test]
fn missing_sink_drops_only_that_mapping() {
    let xml = SUBSTATION.replace(r#"<ExtRef intAddr="Pos.q"/>"#, "");
    let mut doc = SclDocument::parse(&xml).unwrap();
    let stencil = captured(&doc);
    let app = stencil.find_version("Feeder", "Breaker control", "1.0").unwrap();

    let report = apply_stencil(&mut doc, app, &binding(), &ApplyOptions::default());
    assert_eq!(report.subscriptions, 1);
    assert_eq!(report.supervisions, 1);
    assert_eq!(
        report.errors,
        vec![ApplyError::MissingExtRef("P4>>PROT>LLN0>>Pos.q[0]".to_string())]
    );
}

/// The template's second subscription points at a data attribute absent from
/// the data set, so it is captured without a source FCDA.
fn template_without_q_source(xml: &str) -> String {
    xml.replace(
        r#"doName="Pos" daName="q" srcLDInst="CTRL""#,
        r#"doName="Pos" daName="t" srcLDInst="CTRL""#,
    )
}

#[test]
fn missing_source_fcda_drops_only_that_mapping() {
    let mut doc = SclDocument::parse(&template_without_q_source(SUBSTATION)).unwrap();
    let stencil = captured(&doc);
    let app = stencil.find_version("Feeder", "Breaker control", "1.0").unwrap();
    assert_eq!(app.control_blocks[0].mappings.len(), 2);

    let report = apply_stencil(&mut doc, app, &binding(), &ApplyOptions::default());
    assert_eq!(report.subscriptions, 1);
    assert_eq!(report.supervisions, 1);
    assert_eq!(report.errors, vec![ApplyError::MissingFcda("P3NONE".to_string())]);

    let subscribers =
        find_control_block_subscriptions(&doc, gcb01(&doc, "P3"), &MatchOptions::strict());
    assert_eq!(subscribers.len(), 1);
    assert_eq!(doc.attribute(subscribers[0], "intAddr"), Some("Pos.stVal"));
}

#[test]
fn missing_source_and_sink_report_one_error() {
    let xml = template_without_q_source(SUBSTATION).replace(r#"<ExtRef intAddr="Pos.q"/>"#, "");
    let mut doc = SclDocument::parse(&xml).unwrap();
    let stencil = captured(&doc);
    let app = stencil.find_version("Feeder", "Breaker control", "1.0").unwrap();

    let report = apply_stencil(&mut doc, app, &binding(), &ApplyOptions::default());
    assert_eq!(report.subscriptions, 1);
    assert_eq!(report.errors, vec![ApplyError::MissingFcda("P3NONE".to_string())]);
}

#[test]
fn missing_supervision_ln_is_reported() {
    let xml = SUBSTATION.replace(r#"<LN lnClass="LGOS" inst="1" lnType="LGOS_T"/>"#, "");
    let mut doc = SclDocument::parse(&xml).unwrap();
    let stencil = captured(&doc);
    let app = stencil.find_version("Feeder", "Breaker control", "1.0").unwrap();

    let report = apply_stencil(&mut doc, app, &binding(), &ApplyOptions::default());
    assert_eq!(report.subscriptions, 2);
    assert_eq!(report.supervisions, 0);
    assert_eq!(
        report.errors,
        vec![ApplyError::MissingSupervision("P4>>SUP> LGOS 1".to_string())]
    );
}

#[test]
fn partial_binding_only_applies_bound_pairs() {
    let mut doc = SclDocument::parse(SUBSTATION).unwrap();
    let stencil = captured(&doc);
    let app = stencil.find_version("Feeder", "Breaker control", "1.0").unwrap();
    let binding: FunctionBinding = [("Relay", "P3"), ("Monitor", "S2")].into_iter().collect();

    let report = apply_stencil(&mut doc, app, &binding, &ApplyOptions::default());
    assert_eq!(report.subscriptions, 0);
    assert_eq!(report.quality_links, 1);
    assert!(report.is_clean());
}

#[test]
fn application_lifecycle() {
    let mut doc = SclDocument::parse(SUBSTATION).unwrap();
    let stencil = captured(&doc);
    let app = stencil.find_version("Feeder", "Breaker control", "1.0").unwrap();

    let mut run = StencilApplication::new(app);
    assert_eq!(run.stage(), Stage::Captured);
    assert!(run.apply(&mut doc, &ApplyOptions::default()).is_err());
    assert!(run.bind(&doc, "Unknown", "P3").is_err());
    assert!(run.bind(&doc, "Relay", "P99").is_err());

    run.bind(&doc, "Relay", "P3").unwrap();
    run.bind(&doc, "Breaker", "P4").unwrap();
    assert_eq!(run.stage(), Stage::Bound);

    let report = run.apply(&mut doc, &ApplyOptions::default()).unwrap();
    assert_eq!(report.subscriptions, 2);
    assert_eq!(run.stage(), Stage::Applied);
    assert!(run.bind(&doc, "Monitor", "S2").is_err());

    run.reset();
    assert_eq!(run.stage(), Stage::Captured);
    assert!(run.binding().is_empty());
}
