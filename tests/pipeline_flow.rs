use carbon_emissions_pipeline::sanitize::sanitize_file_name;
use carbon_emissions_pipeline::types::Scope;
use carbon_emissions_pipeline::{
    CalculationContext, Outcome, Pipeline, PipelineConfig, TotalsGuard, WarningLevel,
};

fn pipeline() -> Pipeline<'static> {
    Pipeline::from_config(PipelineConfig::default()).expect("embedded dataset")
}

fn run(body: &str) -> Outcome {
    pipeline()
        .run_json(&CalculationContext::new(), body)
        .expect("pipeline run")
}

#[test]
fn full_calculation_produces_guarded_totals() {
    let outcome = run(r#"{
        "projectDetails": { "name": "Depot", "location": "SA" },
        "materials": [
            { "id": "m1", "name": "Steel", "quantity": 1000, "unit": "kg",
              "factor": 1.9, "category": "steel", "isCustom": true }
        ],
        "fuelInputs": { "diesel_stationary": "500" },
        "electricityInputs": { "kwh": 2000 },
        "transportInputs": { "waste_general": 2 }
    }"#);
    let report = outcome.report().expect("computed");
    let t = report.totals;
    assert_eq!(t.scope1, 1350.0);
    assert_eq!(t.scope2, 2000.0 * 0.25);
    assert_eq!(t.scope3_materials, 1900.0);
    assert_eq!(t.scope3_transport, 2400.0);
    assert_eq!(
        t.total,
        t.scope1 + t.scope2 + t.scope3_materials + t.scope3_transport
    );
    assert!(TotalsGuard::check(&t).is_ok());
    assert!(report.rejected.is_empty());

    let scopes: Vec<Scope> = report.breakdown.iter().map(|b| b.scope).collect();
    assert_eq!(
        scopes,
        vec![
            Scope::Scope1,
            Scope::Scope2,
            Scope::Scope3Materials,
            Scope::Scope3Transport
        ]
    );
}

#[test]
fn one_bad_material_row_is_dropped_not_fatal() {
    let rows: Vec<String> = (0..5)
        .map(|i| {
            let quantity = if i == 2 { -1 } else { 10 };
            format!(
                r#"{{ "id": "m{i}", "name": "Row {i}", "quantity": {quantity}, "unit": "kg",
                     "factor": 2, "category": "steel", "isCustom": true }}"#
            )
        })
        .collect();
    let body = format!(
        r#"{{ "projectDetails": {{ "location": "NSW" }}, "materials": [{}] }}"#,
        rows.join(",")
    );
    let outcome = run(&body);
    let report = outcome.report().expect("computed");
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].index, 2);
    assert_eq!(report.totals.scope3_materials, 4.0 * 20.0);
}

#[test]
fn wrongly_typed_row_is_rejected_with_its_field_path() {
    let outcome = run(r#"{
        "projectDetails": { "location": "NSW" },
        "materials": [
            { "id": "m0", "name": "Steel", "quantity": 10, "unit": "kg",
              "factor": 2, "category": "steel", "isCustom": true },
            { "id": "m1", "name": 42, "quantity": 10, "unit": "kg",
              "factor": 2, "category": "steel", "isCustom": "yes" },
            { "id": "m2", "name": "Steel", "quantity": 5, "unit": "kg",
              "factor": 2, "category": "steel", "isCustom": true }
        ]
    }"#);
    let report = outcome.report().expect("computed");
    assert_eq!(report.totals.scope3_materials, 30.0);
    assert_eq!(report.rejected.len(), 1);
    let issues: Vec<String> = report.rejected[0]
        .issues
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(
        issues,
        vec![
            "materials.1.name: Expected string, received number".to_string(),
            "materials.1.isCustom: Expected boolean, received string".to_string(),
        ]
    );
}

#[test]
fn wrongly_typed_project_field_is_a_field_issue() {
    let outcome = run(r#"{ "projectDetails": { "location": 5 } }"#);
    let errors = outcome.errors().expect("invalid");
    assert_eq!(
        errors.messages(),
        vec!["projectDetails.location: Expected string, received number".to_string()]
    );
}

#[test]
fn fullwidth_digits_are_not_a_quantity() {
    let outcome = run(r#"{
        "projectDetails": { "location": "VIC" },
        "fuelInputs": { "petrol": "１２" }
    }"#);
    let errors = outcome.errors().expect("invalid");
    assert_eq!(
        errors.messages(),
        vec!["fuelInputs.petrol: Must be a valid number".to_string()]
    );
}

#[test]
fn unit_conversions_and_high_quantities_are_reported_as_warnings() {
    let outcome = run(r#"{
        "projectDetails": { "location": "NSW" },
        "materials": [
            { "id": "rebar-500e-16mm", "name": "Rebar N16", "quantity": 3, "unit": "tonnes",
              "factor": 1, "category": "steel" },
            { "id": "slab", "name": "Slab pour", "quantity": 12000, "unit": "m³",
              "factor": 300, "category": "concrete", "isCustom": true }
        ]
    }"#);
    let report = outcome.report().expect("computed");
    assert!(report.rejected.is_empty());
    assert_eq!(report.totals.scope3_materials, 3000.0 * 1.65 + 12000.0 * 300.0);

    let lines: Vec<(String, WarningLevel)> = report
        .warnings
        .iter()
        .map(|w| (w.to_string(), w.level))
        .collect();
    assert_eq!(
        lines,
        vec![
            (
                "rebar-500e-16mm: Converted 3 t to 3000 kg".to_string(),
                WarningLevel::Info
            ),
            (
                "slab: Unusually high quantity: 12000 m³".to_string(),
                WarningLevel::Critical
            ),
        ]
    );

    let json = serde_json::to_value(&outcome).expect("serialize");
    assert_eq!(json["warnings"][1]["level"], "critical");
}

#[test]
fn validation_issues_render_as_path_and_message() {
    let outcome = run(r#"{
        "projectDetails": { "location": "NZ" },
        "fuelInputs": { "diesel_stationary": 1000000.0001 }
    }"#);
    let errors = outcome.errors().expect("invalid");
    assert_eq!(
        errors.messages(),
        vec![
            "projectDetails.location: Location must be one of NSW, VIC, QLD, SA, WA, TAS, NT, ACT"
                .to_string(),
            "fuelInputs.diesel_stationary: Quantity too large".to_string(),
        ]
    );
}

#[test]
fn too_many_materials_fails_whole_calculation() {
    let rows: Vec<String> = (0..501)
        .map(|i| {
            format!(
                r#"{{ "id": "m{i}", "name": "Row", "quantity": 1, "unit": "kg",
                     "factor": 1, "category": "steel" }}"#
            )
        })
        .collect();
    let body = format!(
        r#"{{ "projectDetails": {{ "location": "NSW" }}, "materials": [{}] }}"#,
        rows.join(",")
    );
    let errors = run(&body).errors().cloned().expect("invalid");
    assert_eq!(errors.issues[0].to_string(), "materials: Too many materials (max 500)");
}

#[test]
fn html_in_names_is_stripped_before_validation() {
    let outcome = run(r#"{
        "projectDetails": { "name": "<b>Depot</b>", "location": "WA" }
    }"#);
    let report = outcome.report().expect("computed");
    assert_eq!(report.project.name.as_deref(), Some("Depot"));
}

#[test]
fn lifecycle_inputs_add_whole_life_totals() {
    let outcome = run(r#"{
        "projectDetails": { "location": "TAS" },
        "materials": [
            { "id": "m1", "name": "Steel", "quantity": 1000, "unit": "kg",
              "factor": 1.9, "category": "steel", "isCustom": true }
        ],
        "lifecycle": {
            "a5_construction": 100,
            "use_phase": { "b6_operational_energy": 50 },
            "module_d": { "recycling_credits": 20 },
            "building_area_m2": 10
        }
    }"#);
    let wl = outcome
        .report()
        .and_then(|r| r.whole_life)
        .expect("whole life totals");
    assert_eq!(wl.total_upfront, 2000.0);
    assert_eq!(wl.total_whole_life, 2050.0);
    assert_eq!(wl.total_with_benefits, 2030.0);
    assert_eq!(wl.intensity_with_benefits, Some(203.0));
}

#[test]
fn report_serializes_with_status_tag() {
    let outcome = run(r#"{ "projectDetails": { "location": "ACT" } }"#);
    let json = serde_json::to_value(&outcome).expect("serialize");
    assert_eq!(json["status"], "computed");
    assert_eq!(json["totals"]["total"], 0.0);
    assert_eq!(json["warnings"], serde_json::json!([]));
}

#[test]
fn traversal_is_removed_from_file_names() {
    assert_eq!(sanitize_file_name("../../etc/passwd.txt"), "__etc_passwd.txt");
}
