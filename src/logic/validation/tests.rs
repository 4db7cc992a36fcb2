//! Integration Tests for input validation
//!
//! Runs the bundled package configs end to end through `validate_inputs`.

use serde_json::json;

use super::{drop_na_inputs, InputValidator, LocItem, ValidationIssue};
use crate::logic::config::Config;
use crate::logic::data::{Frame, Value};

/// First row of the Kaggle house prices test set
pub(crate) fn house_row() -> serde_json::Value {
    // split to stay under the json! macro recursion limit
    let parts = [
        json!({
            "Id": 1461, "MSSubClass": 20, "MSZoning": "RH", "LotFrontage": 80.0,
            "LotArea": 11622, "Street": "Pave", "LotShape": "Reg", "LandContour": "Lvl",
            "LotConfig": "Inside", "Neighborhood": "NAmes", "OverallQual": 5
        }),
        json!({
            "OverallCond": 6, "YearBuilt": 1961, "YearRemodAdd": 1961, "RoofStyle": "Gable",
            "Exterior1st": "VinylSd", "ExterQual": "TA", "Foundation": "CBlock",
            "BsmtQual": "TA", "BsmtExposure": "No", "BsmtFinType1": "Rec", "HeatingQC": "TA"
        }),
        json!({
            "CentralAir": "Y", "1stFlrSF": 896, "2ndFlrSF": 0, "3SsnPorch": 0,
            "GrLivArea": 896, "BsmtFullBath": 0.0, "HalfBath": 0, "KitchenQual": "TA",
            "TotRmsAbvGrd": 5, "Functional": "Typ", "FireplaceQu": null
        }),
        json!({
            "GarageFinish": "Unf", "GarageCars": 1.0, "GarageArea": 730.0, "PavedDrive": "Y",
            "WoodDeckSF": 140, "ScreenPorch": 120, "SaleCondition": "Normal", "YrSold": 2010
        }),
    ];

    let mut row = serde_json::Map::new();
    for part in parts {
        if let serde_json::Value::Object(map) = part {
            row.extend(map);
        }
    }
    serde_json::Value::Object(row)
}

pub(crate) fn titanic_row() -> serde_json::Value {
    json!({
        "pclass": 3, "name": "Kelly, Mr. James", "sex": "male", "age": 34.5,
        "sibsp": 0, "parch": 0, "ticket": 330911, "fare": 7.8292, "cabin": "?",
        "embarked": "Q", "boat": "?", "body": "?", "home.dest": "?"
    })
}

fn house_validator() -> InputValidator {
    InputValidator::from_config(&Config::house_prices().unwrap()).unwrap()
}

fn titanic_validator() -> InputValidator {
    InputValidator::from_config(&Config::titanic().unwrap()).unwrap()
}

fn issues(errors: &str) -> Vec<ValidationIssue> {
    serde_json::from_str(errors).unwrap()
}

#[test]
fn test_valid_house_rows_pass() {
    let input = Frame::from_json(&json!([house_row(), house_row()])).unwrap();
    let (validated, errors) = house_validator().validate_inputs(input);

    assert!(errors.is_none(), "unexpected errors: {errors:?}");
    assert_eq!(validated.len(), 2);
    assert_eq!(validated.columns(), house_validator().features());
    assert_eq!(validated.get(0, "FirstFlrSF"), &Value::Int(896));
}

#[test]
fn test_nulls_in_non_essential_features_are_retained() {
    let mut row = house_row();
    row["LotFrontage"] = json!(null);
    row["BsmtQual"] = json!(null);
    row["FireplaceQu"] = json!(null);

    let input = Frame::from_json(&json!([row])).unwrap();
    let (validated, errors) = house_validator().validate_inputs(input);

    assert!(errors.is_none());
    assert_eq!(validated.len(), 1);
    assert!(validated.get(0, "LotFrontage").is_null());
}

#[test]
fn test_rows_with_nulls_in_essential_features_are_dropped() {
    let mut incomplete = house_row();
    incomplete["OverallQual"] = json!(null);

    let input = Frame::from_json(&json!([house_row(), incomplete, house_row()])).unwrap();
    let (validated, errors) = house_validator().validate_inputs(input);

    assert!(errors.is_none());
    assert_eq!(validated.len(), 2);
}

#[test]
fn test_wrong_type_is_reported() {
    let mut row = house_row();
    row["OverallQual"] = json!("excellent");

    let input = Frame::from_json(&json!([house_row(), row])).unwrap();
    let (_, errors) = house_validator().validate_inputs(input);

    let issues = issues(&errors.expect("errors expected"));
    assert_eq!(issues.len(), 1);
    assert_eq!(
        issues[0].loc,
        vec![
            LocItem::Key("inputs".into()),
            LocItem::Index(1),
            LocItem::Key("OverallQual".into())
        ]
    );
    assert_eq!(issues[0].kind, "type_error.integer");
}

#[test]
fn test_every_violation_is_collected() {
    let mut first = titanic_row();
    first["sibsp"] = json!("many");
    let mut second = titanic_row();
    second["sex"] = json!({"value": "male"});
    second["parch"] = json!(true);

    let input = Frame::from_json(&json!([first, second])).unwrap();
    let (_, errors) = titanic_validator().validate_inputs(input);

    let issues = issues(&errors.unwrap());
    assert_eq!(issues.len(), 3);
    assert_eq!(issues[0].loc[1], LocItem::Index(0));
    assert_eq!(issues[1].loc[1], LocItem::Index(1));
}

#[test]
fn test_errors_are_pretty_json() {
    let mut row = titanic_row();
    row["age"] = json!("unknown");
    let input = Frame::from_json(&json!([row])).unwrap();
    let (_, errors) = titanic_validator().validate_inputs(input);

    let errors = errors.unwrap();
    assert!(errors.starts_with("[\n  {"));
    assert!(errors.contains("\"msg\": \"value is not a valid integer\""));
}

#[test]
fn test_titanic_markers_and_preparation() {
    let input = Frame::from_json(&json!([titanic_row()])).unwrap();
    let (validated, errors) = titanic_validator().validate_inputs(input);

    assert!(errors.is_none(), "unexpected errors: {errors:?}");
    assert_eq!(validated.len(), 1);
    assert!(validated.get(0, "cabin").is_null());
    assert_eq!(validated.get(0, "title").as_str(), Some("Mr"));
    assert_eq!(validated.get(0, "age"), &Value::Float(34.5));
    assert!(!validated.has_column("ticket"));
}

#[test]
fn test_titanic_keeps_incomplete_rows() {
    let mut row = titanic_row();
    row["sex"] = json!(null);
    let input = Frame::from_json(&json!([row])).unwrap();
    let (validated, errors) = titanic_validator().validate_inputs(input);

    assert!(errors.is_none());
    assert_eq!(validated.len(), 1);
}

#[test]
fn test_missing_feature_column_reads_as_null() {
    let input = Frame::from_json(&json!([{"pclass": 1, "sex": "female"}])).unwrap();
    let (validated, errors) = titanic_validator().validate_inputs(input);

    assert!(errors.is_none());
    assert!(validated.get(0, "fare").is_null());
}

#[test]
fn test_drop_na_inputs_only_checks_strict_features() {
    let frame = Frame::from_json(&json!([
        {"a": 1, "b": null},
        {"a": null, "b": 2},
        {"a": 3, "b": 4}
    ]))
    .unwrap();
    let features = vec!["a".to_string(), "b".to_string()];

    let filtered = drop_na_inputs(frame, &features, &["b"]);
    assert_eq!(filtered.len(), 2);
    assert_eq!(filtered.get(0, "a"), &Value::Int(1));
    assert_eq!(filtered.get(1, "a"), &Value::Int(3));
}

#[test]
fn test_empty_input() {
    let (validated, errors) = house_validator().validate_inputs(Frame::default());
    assert!(validated.is_empty());
    assert!(errors.is_none());
}
