use meter_reconciliation_service::api::generate_openapi_spec;
use std::fs;

/// Write the OpenAPI document of the read API, to `openapi.json` unless a
/// path is given as the first argument.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let output = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "openapi.json".to_string());

    let spec = generate_openapi_spec();
    let json = serde_json::to_string_pretty(&spec)?;

    fs::write(&output, json)?;
    println!("✅ Generated {output} ({} paths)", spec.paths.paths.len());
    Ok(())
}
