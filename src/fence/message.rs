//! Message synthesis.
//!
//! Turns a classified mutation into the ordered list of JSON notifications
//! delivered to subscribers:
//!
//! ```text
//! {"command":"set","group":"g1","detect":"enter","hook":"warehouse","key":"fleet",
//!  "time":"2024-01-01T00:00:00.000000000Z","id":"truck1","object":{...}}
//! ```
//!
//! Correlation groups are assigned here and nowhere else. The scan writer's
//! lock is held only inside [`ScanWriter::render_object`]; assembly happens
//! after it is released.

use super::Fence;
use super::detect::{DetectState, allows};
use super::roam::{RoamMatch, RoamOutcome};
use crate::event::{CommandKind, MutationEvent};
use crate::glob::Pattern;
use crate::scan::{OutputMode, RenderParams, ScanWriter, object_json, push_json_num, push_json_str};
use crate::spatial::{distance_between, round_meters};
use crate::store::{Collaborators, GroupIdGenerator};
use chrono::{DateTime, SecondsFormat, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use spatio_types::Object;

/// A name/value pair attached to every message of a hook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    pub name: String,
    pub value: String,
}

impl Meta {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Correlation tokens by `(key, id)`. At most one live token per object.
#[derive(Debug, Clone, Default)]
pub struct Groups {
    tokens: FxHashMap<(String, String), String>,
}

impl Groups {
    pub fn get(&self, key: &str, id: &str) -> Option<&str> {
        self.tokens
            .get(&(key.to_string(), id.to_string()))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Start a new episode, replacing any live token.
    fn connect(&mut self, key: &str, id: &str, ids: &dyn GroupIdGenerator) -> String {
        let token = ids.next_group();
        self.tokens
            .insert((key.to_string(), id.to_string()), token.clone());
        token
    }

    /// The live token, minted on first sight.
    fn current(&mut self, key: &str, id: &str, ids: &dyn GroupIdGenerator) -> String {
        self.tokens
            .entry((key.to_string(), id.to_string()))
            .or_insert_with(|| ids.next_group())
            .clone()
    }

    fn disconnect(&mut self, key: &str, id: &str) -> Option<String> {
        self.tokens.remove(&(key.to_string(), id.to_string()))
    }

    fn forget_key(&mut self, key: &str) {
        self.tokens.retain(|(k, _), _| k != key);
    }
}

/// A synthesized message before accept filtering.
struct Draft {
    detect: Option<DetectState>,
    payload: String,
}

/// Shared header pieces of every message produced for one event.
struct Envelope<'a> {
    hook: &'a str,
    metas: &'a [Meta],
    event: &'a MutationEvent,
    time: String,
}

impl<'a> Envelope<'a> {
    fn new(hook: &'a str, metas: &'a [Meta], event: &'a MutationEvent) -> Self {
        let time = DateTime::<Utc>::from(event.timestamp);
        // fixed nine-digit fraction keeps times of one stream lexically sortable
        Self {
            hook,
            metas,
            event,
            time: time.to_rfc3339_opts(SecondsFormat::Nanos, true),
        }
    }

    fn push_hook_and_meta(&self, out: &mut String) {
        if !self.hook.is_empty() {
            out.push_str(",\"hook\":");
            push_json_str(out, self.hook);
        }
        if !self.metas.is_empty() {
            out.push_str(",\"meta\":{");
            for (i, meta) in self.metas.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                push_json_str(out, &meta.name);
                out.push(':');
                push_json_str(out, &meta.value);
            }
            out.push('}');
        }
    }

    fn push_time(&self, out: &mut String) {
        out.push_str(",\"time\":");
        push_json_str(out, &self.time);
    }

    fn drop_message(&self) -> String {
        let mut out = String::from("{\"command\":\"drop\"");
        self.push_hook_and_meta(&mut out);
        self.push_time(&mut out);
        out.push('}');
        out
    }

    fn del_message(&self) -> String {
        let mut out = String::from("{\"command\":\"del\"");
        self.push_hook_and_meta(&mut out);
        out.push_str(",\"id\":");
        push_json_str(&mut out, &self.event.id);
        self.push_time(&mut out);
        out.push('}');
        out
    }

    /// `record` is a rendered object without its opening brace.
    fn detect_message(&self, group: &str, detect: DetectState, record: &str) -> String {
        let mut out = String::with_capacity(128 + record.len());
        out.push_str("{\"command\":");
        push_json_str(&mut out, self.event.command.as_str());
        out.push_str(",\"group\":");
        push_json_str(&mut out, group);
        out.push_str(",\"detect\":");
        push_json_str(&mut out, detect.as_str());
        self.push_hook_and_meta(&mut out);
        out.push_str(",\"key\":");
        push_json_str(&mut out, &self.event.key);
        self.push_time(&mut out);
        out.push(',');
        out.push_str(record);
        out
    }
}

/// Evaluate `event` against `fence` and produce its notifications in order.
///
/// Never fails: malformed input, unknown commands and suppressed states all
/// yield an empty list.
pub fn detect_and_emit(
    hook_name: &str,
    writer: &ScanWriter,
    fence: &mut Fence,
    metas: &[Meta],
    event: &MutationEvent,
    ctx: &Collaborators<'_>,
) -> Vec<String> {
    let envelope = Envelope::new(hook_name, metas, event);
    let drafts = match &event.command {
        CommandKind::Drop => {
            fence.state.groups.forget_key(&event.key);
            if event.key == fence.spec.key {
                fence.state.nearby.clear();
            }
            vec![Draft {
                detect: Some(DetectState::Drop),
                payload: envelope.drop_message(),
            }]
        }
        CommandKind::Del => {
            if fence.roam.is_some() {
                fence.state.nearby.remove(&event.id);
            }
            fence.state.groups.disconnect(&event.key, &event.id);
            vec![Draft {
                detect: Some(DetectState::Del),
                payload: envelope.del_message(),
            }]
        }
        CommandKind::Fset if writer.no_fields() => {
            log::trace!("fset on {}/{} hidden by writer", event.key, event.id);
            Vec::new()
        }
        CommandKind::Set | CommandKind::Fset if fence.roam.is_some() => {
            roam_drafts(&envelope, writer, fence, ctx)
        }
        CommandKind::Set | CommandKind::Fset => static_drafts(&envelope, writer, fence, ctx),
        CommandKind::Other(name) => {
            log::trace!("command '{}' produces no messages", name);
            Vec::new()
        }
    };

    let accept = fence.spec.commands.as_ref().filter(|commands| !commands.is_empty());
    drafts
        .into_iter()
        .filter(|draft| {
            accept.is_none_or(|commands| {
                commands.contains(event.command.as_str())
                    || draft
                        .detect
                        .is_some_and(|detect| commands.contains(detect.as_str()))
            })
        })
        .map(|draft| draft.payload)
        .collect()
}

/// Render `object` as a record body (`"id":..,...}`) in the writer's mode.
fn render_record(
    writer: &ScanWriter,
    fence: &Fence,
    id: &str,
    object: &Object,
    event: &MutationEvent,
) -> Option<String> {
    let distance = match (fence.spec.distance, fence.spec.area.as_ref()) {
        (true, Some(area)) => area
            .center()
            .zip(object.representative_point())
            .map(|(center, point)| distance_between(&center, &point)),
        _ => None,
    };
    let rendered = writer.render_object(&RenderParams {
        id,
        object,
        fields: &event.fields,
        distance,
    })?;

    let record = rendered.strip_prefix(',').unwrap_or(&rendered);
    if writer.output() == OutputMode::Ids {
        return Some(format!("\"id\":{record}}}"));
    }
    record.strip_prefix('{').map(str::to_string)
}

fn static_drafts(
    envelope: &Envelope<'_>,
    writer: &ScanWriter,
    fence: &mut Fence,
    ctx: &Collaborators<'_>,
) -> Vec<Draft> {
    let event = envelope.event;
    let Some(state) = fence.detect(event) else {
        return Vec::new();
    };
    let Some(object) = event.new_object.as_ref() else {
        return Vec::new();
    };
    let Some(record) = render_record(writer, fence, &event.id, object, event) else {
        return Vec::new();
    };

    let groups = &mut fence.state.groups;
    let group = match state {
        DetectState::Enter => groups.connect(&event.key, &event.id, ctx.group_ids),
        DetectState::Cross => {
            let token = groups.connect(&event.key, &event.id, ctx.group_ids);
            groups.disconnect(&event.key, &event.id);
            token
        }
        DetectState::Exit => {
            let token = groups.current(&event.key, &event.id, ctx.group_ids);
            groups.disconnect(&event.key, &event.id);
            token
        }
        _ => groups.current(&event.key, &event.id, ctx.group_ids),
    };

    let detect = fence.spec.detect.as_ref();
    let mut drafts = vec![Draft {
        detect: Some(state),
        payload: envelope.detect_message(&group, state, &record),
    }];
    let follow_up = match state {
        DetectState::Enter => Some(DetectState::Inside),
        DetectState::Exit | DetectState::Cross => Some(DetectState::Outside),
        _ => None,
    };
    if let Some(extra) = follow_up.filter(|extra| allows(detect, *extra)) {
        drafts.push(Draft {
            detect: Some(extra),
            payload: envelope.detect_message(&group, extra, &record),
        });
    }
    drafts
}

fn roam_drafts(
    envelope: &Envelope<'_>,
    writer: &ScanWriter,
    fence: &mut Fence,
    ctx: &Collaborators<'_>,
) -> Vec<Draft> {
    let event = envelope.event;
    if fence.detect(event) != Some(DetectState::Roam) {
        return Vec::new();
    }
    let Some(target) = event.new_object.as_ref() else {
        return Vec::new();
    };
    let Some(tracker) = fence.roam.as_ref() else {
        return Vec::new();
    };
    let Some(outcome) = tracker.track(&mut fence.state.nearby, ctx, &event.key, &event.id, target)
    else {
        return Vec::new();
    };
    let Some(record) = render_record(writer, fence, &event.id, target, event) else {
        return Vec::new();
    };

    let groups = &mut fence.state.groups;
    let group = if outcome.started {
        groups.connect(&event.key, &event.id, ctx.group_ids)
    } else {
        groups.current(&event.key, &event.id, ctx.group_ids)
    };
    if fence.state.nearby.get(&event.id).is_none() {
        // nothing left nearby: the episode is over
        fence.state.groups.disconnect(&event.key, &event.id);
    }

    // drop the closing brace so the roam detail can be appended
    let base = &record[..record.len().saturating_sub(1)];
    let RoamOutcome {
        nearby, faraway, ..
    } = outcome;
    let spec = tracker.spec();
    let labelled = nearby
        .iter()
        .map(|m| ("nearby", m))
        .chain(faraway.iter().map(|m| ("faraway", m)));

    labelled
        .map(|(label, matched)| {
            let mut body = String::with_capacity(base.len() + 128);
            body.push_str(base);
            body.push_str(",\"");
            body.push_str(label);
            body.push_str("\":");
            push_roam_detail(&mut body, &spec.key, matched, spec.scan.as_deref(), ctx);
            body.push('}');
            Draft {
                detect: Some(DetectState::Roam),
                payload: envelope.detect_message(&group, DetectState::Roam, &body),
            }
        })
        .collect()
}

/// `{"key":..,"id":..,"object":..,"meters":..[,"scan":[..]]}`
fn push_roam_detail(
    out: &mut String,
    roam_key: &str,
    matched: &RoamMatch,
    scan: Option<&str>,
    ctx: &Collaborators<'_>,
) {
    out.push_str("{\"key\":");
    push_json_str(out, roam_key);
    out.push_str(",\"id\":");
    push_json_str(out, &matched.id);
    out.push_str(",\"object\":");
    out.push_str(&object_json(&matched.object));
    out.push_str(",\"meters\":");
    push_json_num(out, round_meters(matched.meters));

    if let Some(suffix) = scan {
        out.push_str(",\"scan\":[{\"id\":");
        push_json_str(out, &matched.id);
        out.push_str(",\"self\":true,\"object\":");
        out.push_str(&object_json(&matched.object));
        out.push('}');

        let escorts = Pattern::parse(&format!("{}{}", globset::escape(&matched.id), suffix));
        ctx.objects.scan(roam_key, &mut |id, object, _fields| {
            if id != matched.id && escorts.matches(id) && !ctx.expires.has_expired(roam_key, id) {
                out.push_str(",{\"id\":");
                push_json_str(out, id);
                out.push_str(",\"object\":");
                out.push_str(&object_json(object));
                out.push('}');
            }
            true
        });
        out.push(']');
    }
    out.push('}');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FenceSpec, RoamSpec};
    use crate::fence::detect::DetectSet;
    use crate::memory::MemoryStore;
    use crate::store::SequentialGroupIds;
    use serde_json::Value;
    use spatio_types::Fields;
    use std::time::{Duration, UNIX_EPOCH};

    fn bbox_fence() -> Fence {
        Fence::new(FenceSpec::within_bounds("fleet", -0.5, -0.5, 0.5, 0.5)).unwrap()
    }

    fn parse(messages: &[String]) -> Vec<Value> {
        messages
            .iter()
            .map(|m| serde_json::from_str(m).unwrap())
            .collect()
    }

    fn emit(
        fence: &mut Fence,
        writer: &ScanWriter,
        store: &MemoryStore,
        ids: &SequentialGroupIds,
        event: &MutationEvent,
    ) -> Vec<Value> {
        let ctx = Collaborators::new(store, ids);
        parse(&detect_and_emit("warehouse", writer, fence, &[], event, &ctx))
    }

    #[test]
    fn test_enter_is_followed_by_inside() {
        let mut fence = bbox_fence();
        let writer = ScanWriter::new(OutputMode::Objects);
        let mut store = MemoryStore::new();
        let ids = SequentialGroupIds::new();

        store.set("fleet", "truck1", Object::point(10.0, 10.0), Fields::new());
        let event = store.set("fleet", "truck1", Object::point(0.1, 0.1), Fields::new());
        let messages = emit(&mut fence, &writer, &store, &ids, &event);

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["detect"], "enter");
        assert_eq!(messages[1]["detect"], "inside");
        assert_eq!(messages[0]["group"], messages[1]["group"]);
        assert_eq!(messages[0]["command"], "set");
        assert_eq!(messages[0]["hook"], "warehouse");
        assert_eq!(messages[0]["key"], "fleet");
        assert_eq!(messages[0]["id"], "truck1");
        assert_eq!(messages[0]["object"]["type"], "Point");
        assert_eq!(fence.state().groups.get("fleet", "truck1"), Some("g1"));
    }

    #[test]
    fn test_cross_opens_and_closes_an_episode() {
        let mut fence = bbox_fence();
        let writer = ScanWriter::new(OutputMode::Objects);
        let mut store = MemoryStore::new();
        let ids = SequentialGroupIds::new();

        store.set("fleet", "truck1", Object::point(-10.0, 0.0), Fields::new());
        let event = store.set("fleet", "truck1", Object::point(10.0, 0.0), Fields::new());
        let messages = emit(&mut fence, &writer, &store, &ids, &event);

        let detects: Vec<_> = messages.iter().map(|m| m["detect"].clone()).collect();
        assert_eq!(detects, vec!["cross", "outside"]);
        assert_eq!(messages[0]["group"], "g1");
        assert_eq!(messages[1]["group"], "g1");
        assert!(fence.state().groups.is_empty());
    }

    #[test]
    fn test_drop_and_del_messages() {
        let mut fence = bbox_fence();
        let writer = ScanWriter::new(OutputMode::Objects);
        let mut store = MemoryStore::new();
        let ids = SequentialGroupIds::new();
        store.set("fleet", "truck1", Object::point(0.0, 0.0), Fields::new());

        let del = store.del("fleet", "truck1").unwrap();
        let messages = emit(&mut fence, &writer, &store, &ids, &del);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["command"], "del");
        assert_eq!(messages[0]["id"], "truck1");
        assert!(messages[0].get("detect").is_none());

        let dropped = MutationEvent::drop_collection("fleet");
        let messages = emit(&mut fence, &writer, &store, &ids, &dropped);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["command"], "drop");
        assert!(messages[0].get("id").is_none());
        assert_eq!(ids.issued(), 0);
    }

    #[test]
    fn test_meta_and_time() {
        let mut fence = bbox_fence();
        let writer = ScanWriter::new(OutputMode::Objects);
        let store = MemoryStore::new();
        let ids = SequentialGroupIds::new();
        let metas = [Meta::new("region", "west"), Meta::new("owner", "ops")];
        let event = MutationEvent::set("fleet", "truck1", None, Object::point(0.0, 0.0))
            .at(UNIX_EPOCH + Duration::new(1_700_000_000, 5));

        let ctx = Collaborators::new(&store, &ids);
        let messages = detect_and_emit("", &writer, &mut fence, &metas, &event, &ctx);
        assert_eq!(messages.len(), 2);
        assert!(!messages[0].contains("\"hook\""));
        assert!(messages[0].contains("\"meta\":{\"region\":\"west\",\"owner\":\"ops\"}"));

        let value: Value = serde_json::from_str(&messages[0]).unwrap();
        assert_eq!(value["time"], "2023-11-14T22:13:20.000000005Z");

        let whole = event.clone().at(UNIX_EPOCH + Duration::from_secs(1_700_000_000));
        let messages = detect_and_emit("", &writer, &mut fence, &metas, &whole, &ctx);
        let value: Value = serde_json::from_str(&messages[0]).unwrap();
        assert_eq!(value["time"], "2023-11-14T22:13:20.000000000Z");
    }

    #[test]
    fn test_ids_output_wraps_id() {
        let mut fence = bbox_fence();
        let writer = ScanWriter::new(OutputMode::Ids);
        let store = MemoryStore::new();
        let ids = SequentialGroupIds::new();
        let event = MutationEvent::set("fleet", "truck1", None, Object::point(0.0, 0.0));

        let messages = emit(&mut fence, &writer, &store, &ids, &event);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1]["id"], "truck1");
        assert!(messages[1].get("object").is_none());
    }

    #[test]
    fn test_accept_filter_matches_command_or_detect() {
        let spec = FenceSpec::within_bounds("fleet", -0.5, -0.5, 0.5, 0.5);
        let mut fence = Fence::new(spec.clone().with_commands(["inside"])).unwrap();
        let writer = ScanWriter::new(OutputMode::Objects);
        let store = MemoryStore::new();
        let ids = SequentialGroupIds::new();
        let event = MutationEvent::set("fleet", "truck1", None, Object::point(0.0, 0.0));

        let messages = emit(&mut fence, &writer, &store, &ids, &event);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["detect"], "inside");

        let mut fence = Fence::new(spec.with_commands(["set"])).unwrap();
        assert_eq!(emit(&mut fence, &writer, &store, &ids, &event).len(), 2);
        let del = MutationEvent::del("fleet", "truck1", None);
        assert!(emit(&mut fence, &writer, &store, &ids, &del).is_empty());
    }

    #[test]
    fn test_filtered_follow_up() {
        let spec = FenceSpec::within_bounds("fleet", -0.5, -0.5, 0.5, 0.5)
            .with_detect(DetectSet::of(&[DetectState::Enter, DetectState::Exit]));
        let mut fence = Fence::new(spec).unwrap();
        let writer = ScanWriter::new(OutputMode::Objects);
        let store = MemoryStore::new();
        let ids = SequentialGroupIds::new();

        let event = MutationEvent::set("fleet", "truck1", None, Object::point(0.0, 0.0));
        let messages = emit(&mut fence, &writer, &store, &ids, &event);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["detect"], "enter");
    }

    #[test]
    fn test_fset_hidden_from_fieldless_writer() {
        let mut fence = bbox_fence();
        let mut store = MemoryStore::new();
        let ids = SequentialGroupIds::new();
        store.set("fleet", "truck1", Object::point(0.0, 0.0), Fields::new());
        let event = store
            .fset("fleet", "truck1", &Fields::new().with("speed", 3.0))
            .unwrap();

        let plain = ScanWriter::new(OutputMode::Objects);
        let messages = emit(&mut fence, &plain, &store, &ids, &event);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["command"], "fset");
        assert_eq!(messages[0]["detect"], "inside");
        assert_eq!(messages[0]["fields"]["speed"], 3.0);

        let fieldless = ScanWriter::new(OutputMode::Objects).without_fields();
        assert!(emit(&mut fence, &fieldless, &store, &ids, &event).is_empty());
    }

    #[test]
    fn test_distance_from_circle_centre() {
        let spec = FenceSpec::nearby("fleet", 0.0, 0.0, 1_000.0).with_distance();
        let mut fence = Fence::new(spec).unwrap();
        let writer = ScanWriter::new(OutputMode::Objects);
        let store = MemoryStore::new();
        let ids = SequentialGroupIds::new();
        let event = MutationEvent::set("fleet", "truck1", None, Object::point(0.0, 0.001));

        let messages = emit(&mut fence, &writer, &store, &ids, &event);
        let distance = messages[0]["distance"].as_f64().unwrap();
        assert!(distance > 110.0 && distance < 112.0);
    }

    #[test]
    fn test_unknown_command_is_silent() {
        let mut fence = bbox_fence();
        let writer = ScanWriter::new(OutputMode::Objects);
        let store = MemoryStore::new();
        let ids = SequentialGroupIds::new();
        let event = MutationEvent::set("fleet", "truck1", None, Object::point(0.0, 0.0))
            .with_command("expire".parse().unwrap());

        assert!(emit(&mut fence, &writer, &store, &ids, &event).is_empty());
    }

    #[test]
    fn test_roam_messages_carry_match_detail() {
        let roam = RoamSpec::new("fleet", "bus*", 150.0).with_scan(":*");
        let mut fence = Fence::new(FenceSpec::roaming("fleet", roam)).unwrap();
        let writer = ScanWriter::new(OutputMode::Objects);
        let mut store = MemoryStore::new();
        let ids = SequentialGroupIds::new();
        store.set("fleet", "bus1", Object::point(0.0, 0.001), Fields::new());
        // outside the roam radius, found only through the escort scan
        store.set("fleet", "bus1:escort", Object::point(0.0, 0.002), Fields::new());
        store.set("fleet", "bus2:escort", Object::point(5.0, 5.0), Fields::new());

        let event = store.set("fleet", "truck1", Object::point(0.0, 0.0), Fields::new());
        let messages = emit(&mut fence, &writer, &store, &ids, &event);
        assert_eq!(messages.len(), 1);

        let message = &messages[0];
        assert_eq!(message["detect"], "roam");
        assert_eq!(message["id"], "truck1");
        assert_eq!(message["group"], "g1");
        let nearby = &message["nearby"];
        assert_eq!(nearby["key"], "fleet");
        assert_eq!(nearby["id"], "bus1");
        assert!(nearby["meters"].as_f64().unwrap() > 100.0);

        let scan = nearby["scan"].as_array().unwrap();
        assert_eq!(scan.len(), 2);
        assert_eq!(scan[0]["id"], "bus1");
        assert_eq!(scan[0]["self"], true);
        assert_eq!(scan[1]["id"], "bus1:escort");
        assert!(scan[1].get("self").is_none());
    }

    #[test]
    fn test_escort_scan_takes_match_id_literally() {
        let roam = RoamSpec::new("fleet", "bus*", 150.0).with_scan(":*");
        let mut fence = Fence::new(FenceSpec::roaming("fleet", roam)).unwrap();
        let writer = ScanWriter::new(OutputMode::Ids);
        let mut store = MemoryStore::new();
        let ids = SequentialGroupIds::new();
        store.set("fleet", "bus[1]", Object::point(0.0, 0.001), Fields::new());
        store.set("fleet", "bus[1]:a", Object::point(3.0, 3.0), Fields::new());
        // would match if `[1]` were read as a character class
        store.set("fleet", "bus1:b", Object::point(4.0, 4.0), Fields::new());

        let event = store.set("fleet", "truck1", Object::point(0.0, 0.0), Fields::new());
        let messages = emit(&mut fence, &writer, &store, &ids, &event);
        assert_eq!(messages.len(), 1);

        let scan = messages[0]["nearby"]["scan"].as_array().unwrap();
        let scanned: Vec<_> = scan.iter().map(|s| s["id"].as_str().unwrap()).collect();
        assert_eq!(scanned, vec!["bus[1]", "bus[1]:a"]);
    }

    #[test]
    fn test_roam_episode_group_lifecycle() {
        let roam = RoamSpec::new("fleet", "bus*", 150.0);
        let mut fence = Fence::new(FenceSpec::roaming("fleet", roam)).unwrap();
        let writer = ScanWriter::new(OutputMode::Objects);
        let mut store = MemoryStore::new();
        let ids = SequentialGroupIds::new();
        store.set("fleet", "bus1", Object::point(0.0, 0.001), Fields::new());

        let event = store.set("fleet", "truck1", Object::point(0.0, 0.0), Fields::new());
        let first = emit(&mut fence, &writer, &store, &ids, &event);
        assert_eq!(first[0]["group"], "g1");

        let event = store.set("fleet", "truck1", Object::point(0.0, 0.0002), Fields::new());
        let dwell = emit(&mut fence, &writer, &store, &ids, &event);
        assert_eq!(dwell[0]["group"], "g1");

        let event = store.set("fleet", "truck1", Object::point(3.0, 3.0), Fields::new());
        let away = emit(&mut fence, &writer, &store, &ids, &event);
        assert_eq!(away.len(), 1);
        assert_eq!(away[0]["faraway"]["id"], "bus1");
        assert_eq!(away[0]["group"], "g1");
        assert!(fence.state().groups.is_empty());

        // fset never roams
        let event = store
            .fset("fleet", "truck1", &Fields::new().with("speed", 1.0))
            .unwrap();
        assert!(emit(&mut fence, &writer, &store, &ids, &event).is_empty());
    }
}
