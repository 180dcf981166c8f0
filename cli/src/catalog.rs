use session_tunnel_catalog::{Catalog, Persona, Scenario, ScenarioPreset};
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct ScenarioRow {
    id: String,
    name: String,
    steps: usize,
    estimated_s: u64,
    tags: String,
}

impl From<&Scenario> for ScenarioRow {
    fn from(scenario: &Scenario) -> Self {
        Self {
            id: scenario.id.clone(),
            name: scenario.name.clone(),
            steps: scenario.steps.len(),
            estimated_s: scenario.estimated_duration().as_secs(),
            tags: scenario.tags.join(", "),
        }
    }
}

#[derive(Tabled)]
struct PersonaRow {
    id: String,
    name: String,
    company: String,
    role: String,
    urgency: String,
    tech_savvy: u8,
    pace: f64,
}

impl From<&Persona> for PersonaRow {
    fn from(persona: &Persona) -> Self {
        Self {
            id: persona.id.clone(),
            name: persona.name.clone(),
            company: persona.company.clone(),
            role: format!("{:?}", persona.role),
            urgency: format!("{:?}", persona.urgency),
            tech_savvy: persona.tech_savvy,
            pace: persona.pace,
        }
    }
}

#[derive(Tabled)]
struct PresetRow {
    preset: String,
    scenarios: String,
}

pub fn print_catalog(catalog: &Catalog) -> anyhow::Result<()> {
    println!("Scenarios");
    let mut table = Table::new(catalog.list_scenarios(None).into_iter().map(ScenarioRow::from));
    table.with(Style::modern());
    println!("{table}");

    println!("\nPersonas");
    let mut table = Table::new(catalog.list_personas(None)?.into_iter().map(PersonaRow::from));
    table.with(Style::modern());
    println!("{table}");

    println!("\nPresets");
    let rows = ScenarioPreset::VALUES.into_iter().map(|preset| PresetRow {
        preset: preset.to_string(),
        scenarios: catalog
            .list_scenarios(Some(preset))
            .iter()
            .map(|s| s.id.as_str())
            .collect::<Vec<_>>()
            .join(", "),
    });
    let mut table = Table::new(rows);
    table.with(Style::modern());
    println!("{table}");

    Ok(())
}
