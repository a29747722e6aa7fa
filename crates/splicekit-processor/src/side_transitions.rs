//! Side-transition purge paths
//!
//! Three styles, chosen by configuration: extruding in place, jogging along
//! a bed edge, or running a user script. Each produces a [`SidePlan`] the
//! output pass writes through an insertion, with the configured hooks
//! before and after the purge body.

use splicekit_core::constants::IN_PLACE_PURGE_STEP;
use splicekit_core::{
    BedEdge, BoundingBox, ConfigError, HookSettings, Palette, ScriptError,
    SideTransitionSettings, SideTransitionStyle, TransitionMethod,
};
use splicekit_gcode::{Script, ScriptLocals};
use splicekit_tower::Point;

use crate::insert::{InsertMove, PingGate};

const EPSILON: f32 = 1e-4;

/// Scripts compiled once, before any pass runs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SideScripts {
    body: Option<Script>,
    pre_hook: Option<Script>,
    post_hook: Option<Script>,
}

impl SideScripts {
    /// Compile every script the palette's side-transition settings use.
    ///
    /// Syntax errors are configuration errors: they are reported before
    /// the input is read.
    pub fn compile(palette: &Palette) -> Result<Self, ConfigError> {
        if palette.transition_method != TransitionMethod::SideTransitions {
            return Ok(Self::default());
        }
        let settings = &palette.side_transitions;

        let body = match settings.style {
            SideTransitionStyle::Custom => {
                Some(compile("side_transitions.script", &settings.script)?)
            }
            _ => None,
        };
        Ok(Self {
            body,
            pre_hook: compile_hook("side_transitions.pre_hook", &settings.pre_hook)?,
            post_hook: compile_hook("side_transitions.post_hook", &settings.post_hook)?,
        })
    }
}

fn compile(key: &str, source: &str) -> Result<Script, ConfigError> {
    Script::parse(source).map_err(|err| ConfigError::invalid(key, err.to_string()))
}

fn compile_hook(key: &str, hook: &HookSettings) -> Result<Option<Script>, ConfigError> {
    match hook {
        HookSettings::Script(source) => compile(key, source).map(Some),
        _ => Ok(None),
    }
}

/// Live context of one side transition
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SideContext<'a> {
    pub layer: usize,
    /// Nozzle position when the tool change was read
    pub current: [f32; 3],
    /// Where printing resumes afterwards
    pub next: [f32; 3],
    pub print_temperature: f32,
    pub bed_temperature: f32,
    /// Filament to purge (mm)
    pub purge_length: f32,
    pub model_bounds: &'a BoundingBox,
    pub travel_feedrate: f32,
}

impl SideContext<'_> {
    fn locals(&self) -> ScriptLocals {
        let mut locals = ScriptLocals::new();
        locals
            .set("layer", self.layer as f64)
            .set("currentX", self.current[0])
            .set("currentY", self.current[1])
            .set("currentZ", self.current[2])
            .set("nextX", self.next[0])
            .set("nextY", self.next[1])
            .set("nextZ", self.next[2])
            .set("currentPrintTemperature", self.print_temperature)
            .set("currentBedTemperature", self.bed_temperature)
            .set("transitionLength", self.purge_length);
        locals
    }
}

/// Moves of one side transition
#[derive(Debug, Clone, PartialEq)]
pub struct SidePlan {
    pub pre: Vec<InsertMove>,
    pub body: Vec<InsertMove>,
    pub post: Vec<InsertMove>,
    pub gate: PingGate,
}

/// Build the moves for a side transition
pub fn plan(
    settings: &SideTransitionSettings,
    scripts: &SideScripts,
    ctx: &SideContext<'_>,
) -> Result<SidePlan, ScriptError> {
    let locals = ctx.locals();
    let covering = PingGate::Covering {
        purge_length: ctx.purge_length,
    };

    let (start, body, gate) = match (settings.style, &scripts.body) {
        (SideTransitionStyle::Custom, Some(script)) => {
            (None, script_lines(script, &locals)?, PingGate::Always)
        }
        (SideTransitionStyle::OnEdge, _) => {
            let (start, body) = on_edge(settings, ctx.purge_length);
            (Some(start), body, covering)
        }
        _ => {
            let start = in_place_position(settings, ctx.model_bounds);
            (Some(start), in_place(settings, ctx.purge_length), covering)
        }
    };

    let pre = match &settings.pre_hook {
        HookSettings::None => Vec::new(),
        HookSettings::Builtin => builtin_pre(settings.z_lift, ctx, start),
        HookSettings::Script(_) => match &scripts.pre_hook {
            Some(script) => script_lines(script, &locals)?,
            None => Vec::new(),
        },
    };
    let post = match &settings.post_hook {
        HookSettings::None => Vec::new(),
        HookSettings::Builtin => builtin_post(settings.z_lift, ctx),
        HookSettings::Script(_) => match &scripts.post_hook {
            Some(script) => script_lines(script, &locals)?,
            None => Vec::new(),
        },
    };

    Ok(SidePlan {
        pre,
        body,
        post,
        gate,
    })
}

/// Filament pushed by each purge move of a built-in style, in order.
///
/// `None` for scripted purges, whose moves are only known once the script
/// runs.
pub fn purge_steps(settings: &SideTransitionSettings, purge_length: f32) -> Option<Vec<f32>> {
    let body = match settings.style {
        SideTransitionStyle::Custom => return None,
        SideTransitionStyle::OnEdge => on_edge(settings, purge_length).1,
        SideTransitionStyle::InPlace => in_place(settings, purge_length),
    };
    Some(
        body.iter()
            .filter_map(|mv| match mv {
                InsertMove::Extrude { extrusion, .. } => Some(*extrusion),
                _ => None,
            })
            .collect(),
    )
}

fn script_lines(script: &Script, locals: &ScriptLocals) -> Result<Vec<InsertMove>, ScriptError> {
    let text = script.evaluate(locals)?;
    Ok(text
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .map(|line| InsertMove::Raw(line.to_string()))
        .collect())
}

/// Fixed position, or just right of the model's front edge
fn in_place_position(settings: &SideTransitionSettings, bounds: &BoundingBox) -> Point {
    if settings.relative_to_model {
        match bounds.extent() {
            Some(extent) => {
                return Point::new(extent.max[0] + settings.model_offset, extent.min[1]);
            }
            None => tracing::warn!(
                "No model extrusion seen; purging at the fixed side-transition position"
            ),
        }
    }
    Point::new(settings.position_x, settings.position_y)
}

fn in_place(settings: &SideTransitionSettings, purge_length: f32) -> Vec<InsertMove> {
    let mut moves = Vec::new();
    let mut remaining = purge_length;
    while remaining > EPSILON {
        let step = remaining.min(IN_PLACE_PURGE_STEP);
        moves.push(InsertMove::Extrude {
            to: None,
            extrusion: step,
            feedrate: settings.purge_feedrate,
        });
        remaining -= step;
    }
    moves
}

/// End points of the jog line along the configured edge
fn edge_line(settings: &SideTransitionSettings) -> (Point, Point) {
    let margin = settings.edge_margin;
    let (min_x, max_x) = (settings.bed_min_x + margin, settings.bed_max_x - margin);
    let (min_y, max_y) = (settings.bed_min_y + margin, settings.bed_max_y - margin);
    match settings.edge {
        BedEdge::South => (Point::new(min_x, min_y), Point::new(max_x, min_y)),
        BedEdge::North => (Point::new(min_x, max_y), Point::new(max_x, max_y)),
        BedEdge::West => (Point::new(min_x, min_y), Point::new(min_x, max_y)),
        BedEdge::East => (Point::new(max_x, min_y), Point::new(max_x, max_y)),
    }
}

/// Back-and-forth passes along the edge.
///
/// Filament and nozzle travel are timed to finish each pass together, so a
/// full pass purges `length × purge_feedrate / jog_feedrate`. The last pass
/// stops part way to hit the purge length exactly.
fn on_edge(settings: &SideTransitionSettings, purge_length: f32) -> (Point, Vec<InsertMove>) {
    let (a, b) = edge_line(settings);
    let length = a.distance(b);
    if length <= EPSILON {
        tracing::warn!("Side-transition edge has no length after margins; purging in place");
        return (a, in_place(settings, purge_length));
    }

    let per_pass = length * settings.purge_feedrate / settings.jog_feedrate;
    let (mut from, mut to) = (a, b);
    let mut remaining = purge_length;
    let mut moves = Vec::new();
    while remaining > EPSILON {
        if remaining >= per_pass {
            moves.push(InsertMove::Extrude {
                to: Some((to.x, to.y)),
                extrusion: per_pass,
                feedrate: settings.jog_feedrate,
            });
            remaining -= per_pass;
            std::mem::swap(&mut from, &mut to);
        } else {
            let end = from.lerp(to, remaining / per_pass);
            moves.push(InsertMove::Extrude {
                to: Some((end.x, end.y)),
                extrusion: remaining,
                feedrate: settings.jog_feedrate,
            });
            remaining = 0.0;
        }
    }
    (a, moves)
}

fn builtin_pre(lift: f32, ctx: &SideContext<'_>, start: Option<Point>) -> Vec<InsertMove> {
    let z = ctx.current[2];
    let mut moves = vec![InsertMove::travel_z(z + lift, ctx.travel_feedrate)];
    if let Some(start) = start {
        moves.push(InsertMove::travel_xy(start.x, start.y, ctx.travel_feedrate));
        moves.push(InsertMove::travel_z(z, ctx.travel_feedrate));
    }
    moves
}

fn builtin_post(lift: f32, ctx: &SideContext<'_>) -> Vec<InsertMove> {
    vec![
        InsertMove::travel_z(ctx.current[2].max(ctx.next[2]) + lift, ctx.travel_feedrate),
        InsertMove::travel_xy(ctx.next[0], ctx.next[1], ctx.travel_feedrate),
        InsertMove::travel_z(ctx.next[2], ctx.travel_feedrate),
    ]
}
