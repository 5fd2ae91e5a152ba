//! Core engine functions on the global `engine` table.
//!
//! Every closure holds a [`WeakEngines`]: the engines own the host, the host
//! owns the Lua state, and the Lua state owns these closures. Handles cross
//! into Lua as plain integers. Lookups that miss return `nil` or `false`;
//! only malformed arguments raise Lua errors.

use mlua::prelude::*;

use super::host::{LuaHost, from_lua};
use crate::components::animation::{AnimationSpec, FrameGeometry};
use crate::components::sprite::Sprite;
use crate::components::statemachine::{InputBinding, StateDefinition};
use crate::components::tween::{Easing, TweenSpec};
use crate::events::bus::Event;
use crate::events::input::InputPhase;
use crate::resources::handletable::Handle;
use crate::runtime::{CoreEngines, WeakEngines};

fn upgrade(weak: &WeakEngines<LuaHost>) -> LuaResult<CoreEngines<LuaHost>> {
    weak.upgrade()
        .ok_or_else(|| LuaError::runtime("engine core has been shut down"))
}

fn callback(f: Option<LuaFunction>) -> Option<LuaValue> {
    f.map(LuaValue::Function)
}

fn non_nil(v: LuaValue) -> Option<LuaValue> {
    (!v.is_nil()).then_some(v)
}

/// Serialize `value` if present, else `nil`.
fn to_lua_opt<T: serde::Serialize>(lua: &Lua, value: Option<T>) -> LuaResult<LuaValue> {
    match value {
        Some(v) => lua.to_value(&v),
        None => Ok(LuaValue::Nil),
    }
}

/// Registers `engine.<name>(id)` calling `$body` with the upgraded engines
/// and the argument as a [`Handle`].
macro_rules! register_handle_fn {
    ($engine:expr, $lua:expr, $weak:expr, $name:literal, |$e:ident, $h:ident| $body:expr) => {{
        let weak = $weak.clone();
        $engine.set(
            $name,
            $lua.create_function(move |_, id: u64| {
                let $e = upgrade(&weak)?;
                let $h = Handle::from_raw(id);
                Ok($body)
            })?,
        )?;
    }};
}

/// Registers `engine.<name>(id)` returning a serialized snapshot or `nil`.
macro_rules! register_snapshot_fn {
    ($engine:expr, $lua:expr, $weak:expr, $name:literal, |$e:ident, $h:ident| $body:expr) => {{
        let weak = $weak.clone();
        $engine.set(
            $name,
            $lua.create_function(move |lua, id: u64| {
                let $e = upgrade(&weak)?;
                let $h = Handle::from_raw(id);
                to_lua_opt(lua, $body)
            })?,
        )?;
    }};
}

pub(super) fn register(lua: &Lua, weak: WeakEngines<LuaHost>) -> LuaResult<()> {
    let engine: LuaTable = lua.globals().get("engine")?;
    register_tween_api(lua, &engine, &weak)?;
    register_sprite_api(lua, &engine, &weak)?;
    register_animation_api(lua, &engine, &weak)?;
    register_fsm_api(lua, &engine, &weak)?;
    register_event_api(lua, &engine, &weak)?;

    let w = weak.clone();
    engine.set(
        "stats",
        lua.create_function(move |lua, ()| lua.to_value(&upgrade(&w)?.stats()))?,
    )?;
    Ok(())
}

fn register_tween_api(lua: &Lua, engine: &LuaTable, weak: &WeakEngines<LuaHost>) -> LuaResult<()> {
    // engine.tween{ target, property, to, from?, duration, delay?, easing?, on_update?, on_complete? }
    let w = weak.clone();
    engine.set(
        "tween",
        lua.create_function(move |_, opts: LuaTable| {
            let e = upgrade(&w)?;
            let target: LuaValue = opts.get("target")?;
            if target.is_nil() {
                return Err(LuaError::runtime("tween: 'target' is required"));
            }
            let property: String = opts.get("property")?;
            let to: f32 = opts.get("to")?;
            let duration: Option<f32> = opts.get("duration")?;
            let mut spec = TweenSpec::new(target, property, to, duration.unwrap_or(0.0));
            if let Some(from) = opts.get::<Option<f32>>("from")? {
                spec = spec.with_from(from);
            }
            if let Some(delay) = opts.get::<Option<f32>>("delay")? {
                spec = spec.with_delay(delay);
            }
            if let Some(easing) = opts.get::<Option<String>>("easing")? {
                spec = spec.with_easing(Easing::from_name(&easing));
            }
            spec.on_update = callback(opts.get("on_update")?);
            spec.on_complete = callback(opts.get("on_complete")?);
            Ok(e.animations.create_tween(spec).raw())
        })?,
    )?;

    register_handle_fn!(engine, lua, weak, "tween_cancel", |e, h| e.animations.cancel_tween(h));
    register_handle_fn!(engine, lua, weak, "tween_pause", |e, h| e.animations.pause_tween(h));
    register_handle_fn!(engine, lua, weak, "tween_resume", |e, h| e.animations.resume_tween(h));
    register_handle_fn!(engine, lua, weak, "tween_destroy", |e, h| e.animations.destroy_tween(h));
    register_snapshot_fn!(engine, lua, weak, "tween_get", |e, h| e.animations.tween(h));

    // engine.tween_cancel_all(target, property?) -> count
    let w = weak.clone();
    engine.set(
        "tween_cancel_all",
        lua.create_function(move |_, (target, property): (LuaValue, Option<String>)| {
            Ok(upgrade(&w)?
                .animations
                .cancel_tweens_for(&target, property.as_deref()))
        })?,
    )?;
    Ok(())
}

fn register_sprite_api(lua: &Lua, engine: &LuaTable, weak: &WeakEngines<LuaHost>) -> LuaResult<()> {
    let w = weak.clone();
    engine.set(
        "sprite_create",
        lua.create_function(move |_, (tex_key, width, height): (String, f32, f32)| {
            Ok(upgrade(&w)?
                .animations
                .create_sprite(Sprite::new(tex_key, width, height))
                .raw())
        })?,
    )?;
    register_handle_fn!(engine, lua, weak, "sprite_destroy", |e, h| e.animations.destroy_sprite(h));
    register_snapshot_fn!(engine, lua, weak, "sprite_rect", |e, h| e
        .animations
        .sprite(h)
        .map(|s| s.source));
    Ok(())
}

fn register_animation_api(
    lua: &Lua,
    engine: &LuaTable,
    weak: &WeakEngines<LuaHost>,
) -> LuaResult<()> {
    // engine.animation{ sprite?, frames, fps, loop?, frame_width, frame_height,
    //                   columns?, autoplay?, on_frame?, on_complete? }
    let w = weak.clone();
    engine.set(
        "animation",
        lua.create_function(move |_, opts: LuaTable| {
            let e = upgrade(&w)?;
            let frames: Vec<u32> = opts.get("frames")?;
            let fps: f32 = opts.get("fps")?;
            let geometry = FrameGeometry::new(
                opts.get("frame_width")?,
                opts.get("frame_height")?,
                opts.get::<Option<u32>>("columns")?.unwrap_or(1),
            );
            let mut spec = AnimationSpec::new(frames, fps, geometry)
                .with_looping(opts.get::<Option<bool>>("loop")?.unwrap_or(false))
                .with_autoplay(opts.get::<Option<bool>>("autoplay")?.unwrap_or(true));
            if let Some(sprite) = opts.get::<Option<u64>>("sprite")? {
                spec = spec.with_sprite(Handle::from_raw(sprite));
            }
            spec.on_frame = callback(opts.get("on_frame")?);
            spec.on_complete = callback(opts.get("on_complete")?);
            Ok(e.animations.create_animation(spec).raw())
        })?,
    )?;

    register_handle_fn!(engine, lua, weak, "animation_destroy", |e, h| e
        .animations
        .destroy_animation(h));
    register_handle_fn!(engine, lua, weak, "animation_play", |e, h| e.animations.play_animation(h));
    register_handle_fn!(engine, lua, weak, "animation_stop", |e, h| e.animations.stop_animation(h));
    register_snapshot_fn!(engine, lua, weak, "animation_get", |e, h| e.animations.animation(h));

    let w = weak.clone();
    engine.set(
        "animation_bind_sprite",
        lua.create_function(move |_, (anim, sprite): (u64, u64)| {
            Ok(upgrade(&w)?
                .animations
                .bind_sprite(Handle::from_raw(anim), Handle::from_raw(sprite)))
        })?,
    )?;
    Ok(())
}

fn register_fsm_api(lua: &Lua, engine: &LuaTable, weak: &WeakEngines<LuaHost>) -> LuaResult<()> {
    let w = weak.clone();
    engine.set(
        "fsm_create",
        lua.create_function(move |_, owner: LuaValue| {
            Ok(upgrade(&w)?.machines.create(non_nil(owner)).raw())
        })?,
    )?;
    register_handle_fn!(engine, lua, weak, "fsm_destroy", |e, h| e.machines.destroy(h));
    register_handle_fn!(engine, lua, weak, "fsm_current", |e, h| e.machines.current_state(h));
    register_snapshot_fn!(engine, lua, weak, "fsm_get", |e, h| e.machines.machine(h));
    register_handle_fn!(engine, lua, weak, "fsm_unbind_input", |e, h| e.machines.unbind_input(h));

    // engine.fsm_add_state(h, name, { on_enter?, on_exit?, on_update?, animation? })
    let w = weak.clone();
    engine.set(
        "fsm_add_state",
        lua.create_function(move |_, (id, name, def): (u64, String, Option<LuaTable>)| {
            let e = upgrade(&w)?;
            let mut state = StateDefinition::new();
            if let Some(def) = def {
                state.on_enter = callback(def.get("on_enter")?);
                state.on_exit = callback(def.get("on_exit")?);
                state.on_update = callback(def.get("on_update")?);
                state.animation = def.get("animation")?;
            }
            Ok(e.machines.add_state(Handle::from_raw(id), name, state))
        })?,
    )?;

    let w = weak.clone();
    engine.set(
        "fsm_add_transition",
        lua.create_function(
            move |_, (id, from, event, to, guard): (u64, String, String, String, Option<LuaFunction>)| {
                Ok(upgrade(&w)?.machines.add_transition(
                    Handle::from_raw(id),
                    from,
                    event,
                    to,
                    callback(guard),
                ))
            },
        )?,
    )?;

    let w = weak.clone();
    engine.set(
        "fsm_set_initial",
        lua.create_function(move |_, (id, state): (u64, String)| {
            Ok(upgrade(&w)?.machines.set_initial(Handle::from_raw(id), state))
        })?,
    )?;

    let w = weak.clone();
    engine.set(
        "fsm_trigger",
        lua.create_function(move |_, (id, event): (u64, String)| {
            Ok(upgrade(&w)?.machines.trigger(Handle::from_raw(id), &event))
        })?,
    )?;

    let w = weak.clone();
    engine.set(
        "fsm_set_state",
        lua.create_function(move |_, (id, state): (u64, String)| {
            Ok(upgrade(&w)?.machines.set_state(Handle::from_raw(id), &state))
        })?,
    )?;

    let w = weak.clone();
    engine.set(
        "fsm_bind_sprite",
        lua.create_function(move |_, (id, sprite): (u64, u64)| {
            Ok(upgrade(&w)?
                .machines
                .bind_sprite(Handle::from_raw(id), Handle::from_raw(sprite)))
        })?,
    )?;

    let w = weak.clone();
    engine.set(
        "fsm_add_animation",
        lua.create_function(move |_, (id, name, anim): (u64, String, u64)| {
            Ok(upgrade(&w)?
                .machines
                .register_animation(Handle::from_raw(id), name, Handle::from_raw(anim)))
        })?,
    )?;

    // engine.fsm_bind_input(h, { action, phase, to, from?, guard?, forced? }) -> id or nil
    let w = weak.clone();
    engine.set(
        "fsm_bind_input",
        lua.create_function(move |_, (id, opts): (u64, LuaTable)| {
            let e = upgrade(&w)?;
            let action: String = opts.get("action")?;
            let phase_name: String = opts.get("phase")?;
            let phase = InputPhase::from_name(&phase_name).ok_or_else(|| {
                LuaError::runtime(format!("fsm_bind_input: unknown phase '{}'", phase_name))
            })?;
            let to: String = opts.get("to")?;
            let mut binding = InputBinding::new(Handle::from_raw(id), action, phase, to)
                .with_forced(opts.get::<Option<bool>>("forced")?.unwrap_or(false));
            if let Some(from) = opts.get::<Option<String>>("from")? {
                binding = binding.with_from_state(from);
            }
            if let Some(guard) = opts.get::<Option<LuaFunction>>("guard")? {
                binding = binding.with_guard(LuaValue::Function(guard));
            }
            Ok(e.machines.bind_input(binding).map(Handle::raw))
        })?,
    )?;
    Ok(())
}

fn register_event_api(lua: &Lua, engine: &LuaTable, weak: &WeakEngines<LuaHost>) -> LuaResult<()> {
    let w = weak.clone();
    engine.set(
        "subscribe",
        lua.create_function(
            move |_, (event_type, f, ctx): (String, LuaFunction, LuaValue)| {
                Ok(upgrade(&w)?
                    .bus
                    .subscribe(event_type, LuaValue::Function(f), non_nil(ctx))
                    .raw())
            },
        )?,
    )?;
    register_handle_fn!(engine, lua, weak, "unsubscribe", |e, h| e.bus.unsubscribe(h));

    // engine.publish(type, ...)
    let w = weak.clone();
    engine.set(
        "publish",
        lua.create_function(move |_, (event_type, args): (String, LuaMultiValue)| {
            let payload = args.iter().map(from_lua).collect();
            upgrade(&w)?
                .bus
                .publish(Event::from_script(&event_type, payload));
            Ok(())
        })?,
    )?;
    Ok(())
}
