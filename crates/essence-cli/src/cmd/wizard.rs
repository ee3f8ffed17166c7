//! `ess wizard`: drive the recipe wizard one step per invocation.

use clap::{Args, Subcommand};
use essence_core::model::{
    AgeCategory, Demographics, Gender, PotentialCause, PotentialSymptom, RecipeStep,
    TherapeuticProperty,
};
use essence_core::selectors::{self, NavigationSlice, Progress, SelectionCounts};
use essence_core::steps::Validation;
use essence_core::store::StreamKind;
use essence_core::{OilFanout, RecipeError, WebhookClient, WizardState, steps};
use serde::Serialize;
use std::collections::BTreeSet;
use std::io::{self, Write};
use tracing::info;

use super::CmdContext;
use crate::output::{fail, pretty_kv, pretty_section, render, render_mode};
use crate::session::Session;

#[derive(Subcommand, Debug)]
pub enum WizardCommand {
    /// Start a new draft with a health concern.
    Start(StartArgs),
    /// Record gender, age category and age.
    Demographics(DemographicsArgs),
    /// Fetch candidate causes for the concern.
    Causes,
    /// Pick causes by their 1-based number from `ess wizard causes`.
    SelectCauses(SelectArgs),
    /// Fetch candidate symptoms for the selected causes.
    Symptoms,
    /// Pick symptoms by their 1-based number from `ess wizard symptoms`.
    SelectSymptoms(SelectArgs),
    /// Fetch therapeutic properties and keep all of them.
    Properties,
    /// Fetch oil suggestions for every property at once.
    Oils,
    /// Show the current draft.
    Status,
    /// Return to an earlier step.
    Back(BackArgs),
    /// Discard the draft and start over.
    Reset,
}

#[derive(Args, Debug)]
pub struct StartArgs {
    /// What the recipe should help with.
    #[arg(long)]
    pub concern: String,
}

#[derive(Args, Debug)]
pub struct DemographicsArgs {
    /// male, female, or other.
    #[arg(long)]
    pub gender: String,
    /// child, teen, adult, or senior.
    #[arg(long)]
    pub age_category: String,
    #[arg(long)]
    pub age: u8,
}

#[derive(Args, Debug)]
pub struct SelectArgs {
    /// Item numbers as listed by the fetch command.
    #[arg(required = true, num_args = 1..)]
    pub numbers: Vec<usize>,
}

#[derive(Args, Debug)]
pub struct BackArgs {
    /// Step name, e.g. `causes` or `health-concern`.
    pub step: RecipeStep,

    /// Also drop everything entered after `step`.
    #[arg(long)]
    pub clear: bool,
}

/// Draft summary printed by most wizard commands.
#[derive(Debug, Serialize)]
struct WizardView {
    session_id: String,
    current_step: RecipeStep,
    navigation: NavigationSlice,
    progress: Progress,
    counts: SelectionCounts,
    #[serde(skip_serializing_if = "Option::is_none")]
    health_concern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    demographics: Option<Demographics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl WizardView {
    fn of(state: &WizardState) -> Self {
        Self {
            session_id: state.session_id.to_string(),
            current_step: state.current_step,
            navigation: selectors::navigation(state),
            progress: selectors::progress(state),
            counts: selectors::selection_counts(state),
            health_concern: state.health_concern.as_ref().map(|c| c.text.clone()),
            demographics: state.demographics,
            error: state.error.clone().or_else(|| state.streaming_error.clone()),
        }
    }
}

/// A numbered candidate list (causes or symptoms).
#[derive(Debug, Serialize)]
struct Candidates<'a, T> {
    step: RecipeStep,
    items: &'a [T],
}

pub fn run_wizard(command: &WizardCommand, ctx: &CmdContext) -> anyhow::Result<()> {
    let storage = ctx.storage().map_err(|e| fail(ctx.output, e))?;
    let session = Session::open(storage, ctx.config.autosave.performance_mode)
        .map_err(|e| fail(ctx.output, e))?;

    match command {
        WizardCommand::Start(args) => start(&session, args),
        WizardCommand::Demographics(args) => demographics(&session, args),
        WizardCommand::Causes => return causes(&session, ctx),
        WizardCommand::SelectCauses(args) => select_causes(&session, &args.numbers),
        WizardCommand::Symptoms => return symptoms(&session, ctx),
        WizardCommand::SelectSymptoms(args) => select_symptoms(&session, &args.numbers),
        WizardCommand::Properties => properties(&session, ctx),
        WizardCommand::Oils => return oils(&session, ctx),
        WizardCommand::Status => Ok(()),
        WizardCommand::Back(args) => back(&session, args.step, args.clear),
        WizardCommand::Reset => {
            session.store().reset_wizard();
            Ok(())
        }
    }
    .map_err(|e| fail(ctx.output, e))?;

    if ctx.chatty() || matches!(command, WizardCommand::Status) {
        render_view(ctx, &session.snapshot())?;
    }
    Ok(())
}

fn start(session: &Session, args: &StartArgs) -> Result<(), RecipeError> {
    let concern = steps::validate_health_concern(&args.concern)?;
    let mut store = session.store();
    store.reset_wizard();
    store.update_health_concern(concern);
    store.advance()?;
    info!(session = %store.state().session_id, "new draft started");
    Ok(())
}

fn demographics(session: &Session, args: &DemographicsArgs) -> Result<(), RecipeError> {
    let demographics = Demographics {
        gender: args.gender.parse::<Gender>()?,
        age_category: args.age_category.parse::<AgeCategory>()?,
        specific_age: args.age,
    };
    steps::validate_demographics(&demographics)?;
    let mut store = session.store();
    store.navigate_to(RecipeStep::Demographics)?;
    store.update_demographics(demographics);
    store.advance()?;
    Ok(())
}

/// Run a fetch with the step's loading and streaming flags raised, recording
/// any failure on the draft.
fn fetch<T>(
    session: &Session,
    kind: StreamKind,
    call: impl FnOnce(&WizardState) -> Result<T, RecipeError>,
) -> Result<T, RecipeError> {
    let snapshot = {
        let mut store = session.store();
        store.navigate_to(kind.step())?;
        store.set_error(None);
        store.set_loading(true);
        store.set_streaming(kind, true);
        store.snapshot()
    };

    let result = call(snapshot.as_ref());

    let mut store = session.store();
    store.set_loading(false);
    match &result {
        Ok(_) => {
            store.set_streaming(kind, false);
        }
        Err(e) => {
            store.set_streaming_error(Some(e.to_string()));
            store.set_error(Some(e.to_string()));
        }
    }
    result
}

fn client(ctx: &CmdContext) -> Result<WebhookClient, RecipeError> {
    ctx.config.webhook_client()
}

fn causes(session: &Session, ctx: &CmdContext) -> anyhow::Result<()> {
    let found = client(ctx)
        .and_then(|client| {
            fetch(session, StreamKind::Causes, |state| {
                client.fetch_potential_causes(state)
            })
        })
        .map_err(|e| fail(ctx.output, e))?;
    session.store().set_potential_causes(found.clone());
    let list = Candidates {
        step: RecipeStep::Causes,
        items: &found,
    };
    render_mode(
        ctx.output,
        &list,
        |l, w| {
            for (i, cause) in l.items.iter().enumerate() {
                writeln!(w, "{}\t{}", i + 1, cause.cause_name)?;
            }
            Ok(())
        },
        |l, w| write_causes(w, l.items),
    )
}

fn write_causes(w: &mut dyn Write, causes: &[PotentialCause]) -> io::Result<()> {
    pretty_section(w, "Potential causes")?;
    for (i, cause) in causes.iter().enumerate() {
        writeln!(w, "{:>3}. {}", i + 1, cause.cause_name)?;
        if !cause.explanation.is_empty() {
            writeln!(w, "     {}", cause.explanation)?;
        }
    }
    writeln!(w, "\nPick with: ess wizard select-causes <n>...")
}

fn symptoms(session: &Session, ctx: &CmdContext) -> anyhow::Result<()> {
    let found = client(ctx)
        .and_then(|client| {
            fetch(session, StreamKind::Symptoms, |state| {
                client.fetch_potential_symptoms(state)
            })
        })
        .map_err(|e| fail(ctx.output, e))?;
    session.store().set_potential_symptoms(found.clone());
    let list = Candidates {
        step: RecipeStep::Symptoms,
        items: &found,
    };
    render_mode(
        ctx.output,
        &list,
        |l, w| {
            for (i, symptom) in l.items.iter().enumerate() {
                writeln!(w, "{}\t{}", i + 1, symptom.symptom_name)?;
            }
            Ok(())
        },
        |l, w| write_symptoms(w, l.items),
    )
}

fn write_symptoms(w: &mut dyn Write, symptoms: &[PotentialSymptom]) -> io::Result<()> {
    pretty_section(w, "Potential symptoms")?;
    for (i, symptom) in symptoms.iter().enumerate() {
        writeln!(w, "{:>3}. {}", i + 1, symptom.symptom_name)?;
    }
    writeln!(w, "\nPick with: ess wizard select-symptoms <n>...")
}

/// Resolve 1-based picks against `candidates`, keeping first-seen order.
fn pick<T: Clone>(candidates: &[T], numbers: &[usize]) -> Result<Vec<T>, RecipeError> {
    if candidates.is_empty() {
        return Err(RecipeError::validation(
            "selection",
            "nothing to choose from yet; fetch candidates first",
        ));
    }
    let mut seen = BTreeSet::new();
    let mut picked = Vec::new();
    for &n in numbers {
        let item = n
            .checked_sub(1)
            .and_then(|i| candidates.get(i))
            .ok_or_else(|| {
                RecipeError::validation(
                    "selection",
                    format!("{n} is not between 1 and {}", candidates.len()),
                )
            })?;
        if seen.insert(n) {
            picked.push(item.clone());
        }
    }
    Ok(picked)
}

fn select_causes(session: &Session, numbers: &[usize]) -> Result<(), RecipeError> {
    let mut store = session.store();
    store.navigate_to(RecipeStep::Causes)?;
    let picked = pick(&store.state().potential_causes, numbers)?;
    steps::validate_selection(RecipeStep::Causes, picked.len())?;
    store.update_selected_causes(picked);
    store.advance()?;
    Ok(())
}

fn select_symptoms(session: &Session, numbers: &[usize]) -> Result<(), RecipeError> {
    let mut store = session.store();
    store.navigate_to(RecipeStep::Symptoms)?;
    let picked = pick(&store.state().potential_symptoms, numbers)?;
    steps::validate_selection(RecipeStep::Symptoms, picked.len())?;
    store.update_selected_symptoms(picked);
    store.advance()?;
    Ok(())
}

fn properties(session: &Session, ctx: &CmdContext) -> Result<(), RecipeError> {
    let client = client(ctx)?;
    let found = fetch(session, StreamKind::Properties, |state| {
        client
            .fetch_therapeutic_properties(state)
            .and_then(keep_top_properties)
    })?;
    let mut store = session.store();
    store.update_therapeutic_properties(found);
    store.advance()?;
    Ok(())
}

/// Cap the service's answer at what the step may hold, keeping the most
/// relevant properties. Ties keep the service's order.
fn keep_top_properties(
    mut found: Vec<TherapeuticProperty>,
) -> Result<Vec<TherapeuticProperty>, RecipeError> {
    if let Validation::Selection { max, .. } = steps::config_for(RecipeStep::Properties).validation
        && found.len() > max
    {
        info!(offered = found.len(), kept = max, "trimming therapeutic properties");
        found.sort_by(|a, b| b.relevancy.cmp(&a.relevancy));
        found.truncate(max);
    }
    steps::validate_selection(RecipeStep::Properties, found.len())?;
    Ok(found)
}

fn oils(session: &Session, ctx: &CmdContext) -> anyhow::Result<()> {
    let fanout = client(ctx)
        .and_then(|client| {
            fetch(session, StreamKind::Oils, |state| {
                client.fetch_suggested_oils(state)
            })
        })
        .map_err(|e| fail(ctx.output, e))?;
    {
        let mut store = session.store();
        store.set_suggested_oils(fanout.suggestions.clone());
        store.mark_step_completed(RecipeStep::Oils);
    }
    render(ctx.output, &fanout, write_oils)
}

fn write_oils(fanout: &OilFanout, w: &mut dyn Write) -> io::Result<()> {
    for suggestion in &fanout.suggestions {
        pretty_section(w, &suggestion.property_name)?;
        for oil in &suggestion.suggested_oils {
            writeln!(w, "  {} ({}/5)  {}", oil.name_english, oil.relevancy, oil.match_rationale)?;
        }
        writeln!(w)?;
    }
    for failure in &fanout.failed {
        writeln!(
            w,
            "! {} failed [{}]: {}",
            failure.property_name, failure.code, failure.message
        )?;
    }
    Ok(())
}

fn back(session: &Session, step: RecipeStep, clear: bool) -> Result<(), RecipeError> {
    let mut store = session.store();
    let current = store.state().current_step;
    if step > current {
        return Err(RecipeError::InvalidTransition {
            from: current,
            to: step,
            reason: "can only go back to an earlier step",
        });
    }
    store.navigate_to(step)?;
    if clear {
        store.clear_steps_after(step);
    }
    Ok(())
}

fn render_view(ctx: &CmdContext, state: &WizardState) -> anyhow::Result<()> {
    let view = WizardView::of(state);
    render_mode(
        ctx.output,
        &view,
        |v, w| {
            writeln!(
                w,
                "{}\t{}\t{}%\t{}",
                v.session_id, v.current_step, v.progress.percent, v.counts.selected_causes
            )
        },
        |v, w| {
            pretty_section(w, "Recipe wizard")?;
            pretty_kv(w, "Session", &v.session_id)?;
            pretty_kv(w, "Step", format!("{} ({}%)", v.current_step, v.progress.percent))?;
            if let Some(concern) = &v.health_concern {
                pretty_kv(w, "Concern", concern)?;
            }
            if let Some(d) = &v.demographics {
                pretty_kv(
                    w,
                    "Demographics",
                    format!("{}, {}, {}", d.gender, d.age_category, d.specific_age),
                )?;
            }
            pretty_kv(
                w,
                "Selected",
                format!(
                    "{} causes, {} symptoms, {} properties",
                    v.counts.selected_causes, v.counts.selected_symptoms, v.counts.therapeutic_properties
                ),
            )?;
            if let Some(error) = &v.error {
                pretty_kv(w, "Last error", error)?;
            }
            Ok(())
        },
    )
}
