//! Note type and group setup.
//!
//! Records are created with a two-field note type owned by this tool. The
//! type and every group in use are created on demand before a run submits
//! anything; an existing note type gets its templates and styling
//! refreshed so edits here reach the store.

use std::collections::{BTreeMap, BTreeSet};

use flashcard_core::{BACK_FIELD, FRONT_FIELD};

use crate::client::{
    Action, ActionResponse, CardTemplate, ModelStyling, ModelTemplates, RecordStoreClient,
    TemplateSides,
};
use crate::error::{Result, SyncError};

const TEMPLATE_NAME: &str = "Card 1";

const FRONT_TEMPLATE: &str = "<div class=\"front\">{{Front}}</div>";

const BACK_TEMPLATE: &str =
    "<div class=\"front\">{{Front}}</div>\n<hr id=\"answer\">\n<div class=\"back\">{{Back}}</div>";

const CSS: &str = r#".card {
  font-family: -apple-system, "Segoe UI", Helvetica, Arial, sans-serif;
  font-size: 18px;
  line-height: 1.5;
  text-align: left;
  color: #1f2328;
  background-color: #ffffff;
}

.front {
  font-weight: 600;
}

pre {
  padding: 0.75em;
  overflow-x: auto;
  border-radius: 6px;
  background-color: #f6f8fa;
}

code {
  font-family: ui-monospace, "SFMono-Regular", Menlo, Consolas, monospace;
  font-size: 0.9em;
}

table {
  border-collapse: collapse;
}

th, td {
  padding: 0.25em 0.75em;
  border: 1px solid #d0d7de;
}

.nightMode .card, .night_mode .card {
  color: #e6edf3;
  background-color: #0d1117;
}

.nightMode pre, .night_mode pre {
  background-color: #161b22;
}
"#;

/// Action creating the note type from scratch.
pub fn create_model(model_name: &str) -> Action {
    Action::CreateModel {
        model_name: model_name.to_string(),
        in_order_fields: vec![FRONT_FIELD.to_string(), BACK_FIELD.to_string()],
        css: CSS.to_string(),
        is_cloze: false,
        card_templates: vec![CardTemplate {
            name: TEMPLATE_NAME.to_string(),
            front: FRONT_TEMPLATE.to_string(),
            back: BACK_TEMPLATE.to_string(),
        }],
    }
}

/// Actions refreshing an existing note type.
pub fn update_model(model_name: &str) -> Vec<Action> {
    vec![
        Action::UpdateModelTemplates {
            model: ModelTemplates {
                name: model_name.to_string(),
                templates: BTreeMap::from([(
                    TEMPLATE_NAME.to_string(),
                    TemplateSides {
                        front: FRONT_TEMPLATE.to_string(),
                        back: BACK_TEMPLATE.to_string(),
                    },
                )]),
            },
        },
        Action::UpdateModelStyling {
            model: ModelStyling {
                name: model_name.to_string(),
                css: CSS.to_string(),
            },
        },
    ]
}

/// Setup actions given the note types and groups that already exist.
pub fn setup_actions(
    model_name: &str,
    existing_models: &[String],
    existing_groups: &[String],
    groups_in_use: &BTreeSet<String>,
) -> Vec<Action> {
    let mut actions = if existing_models.iter().any(|m| m == model_name) {
        update_model(model_name)
    } else {
        vec![create_model(model_name)]
    };

    actions.extend(
        groups_in_use
            .iter()
            .filter(|group| !existing_groups.contains(group))
            .map(|group| Action::CreateDeck {
                deck: group.clone(),
            }),
    );
    actions
}

/// Make sure the note type and every group in use exist.
pub async fn ensure_setup(
    client: &dyn RecordStoreClient,
    model_name: &str,
    groups_in_use: &BTreeSet<String>,
) -> Result<()> {
    let responses = client
        .multi(vec![Action::ModelNames, Action::DeckNames])
        .await?;
    let [models, groups]: [ActionResponse; 2] = responses
        .try_into()
        .map_err(|_| SyncError::Shape("setup lookup returned wrong count".to_string()))?;
    let models: Vec<String> = models.decode("modelNames")?;
    let groups: Vec<String> = groups.decode("deckNames")?;

    let actions = setup_actions(model_name, &models, &groups, groups_in_use);
    tracing::debug!(count = actions.len(), "submitting setup actions");

    let names: Vec<&'static str> = actions.iter().map(Action::name).collect();
    let responses = client.multi(actions).await?;
    for (name, response) in names.into_iter().zip(responses) {
        response.into_result(name)?;
    }
    Ok(())
}
