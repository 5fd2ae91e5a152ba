//! Lua script integration tests.
//!
//! Scripts use the `engine` API while the frames run through
//! [`Runtime::tick`].

#![cfg(feature = "lua")]

use aberredcore::resources::coreconfig::CoreConfig;
use aberredcore::resources::lua_runtime::{LuaHost, LuaRuntime};
use aberredcore::resources::scripthost::ScriptHost;
use aberredcore::runtime::Runtime;
use mlua::prelude::*;

fn setup(script: &str) -> (LuaRuntime, Runtime<LuaHost>) {
    let lua = LuaRuntime::new().unwrap();
    let rt = Runtime::new(lua.host(), CoreConfig::new());
    lua.register_engine_api(rt.engines()).unwrap();
    lua.exec(script).unwrap();
    (lua, rt)
}

fn eval<R: FromLuaMulti>(lua: &LuaRuntime, code: &str) -> R {
    lua.lua().load(code).eval().unwrap()
}

const JUMP_SCENE: &str = r#"
    log = {}
    player = { stamina = 0, animations = {} }
    fsm = engine.fsm_create(player)
    engine.fsm_add_state(fsm, "idle", {
        on_enter = function(self, id, prev) table.insert(log, "enter_idle:" .. tostring(prev)) end,
        on_exit = function(self, id, target) table.insert(log, "exit_idle:" .. target) end,
    })
    engine.fsm_add_state(fsm, "jump", {
        on_enter = function(self, id, prev) table.insert(log, "enter_jump:" .. prev) end,
    })
    engine.fsm_add_transition(fsm, "idle", "jump", "jump", function(self, id, event)
        return self.stamina > 0
    end)
    engine.fsm_set_initial(fsm, "idle")
"#;

#[test]
fn guarded_transition_reads_owner_from_lua() {
    let (lua, mut rt) = setup(JUMP_SCENE);
    rt.tick(0.016);

    assert!(!eval::<bool>(&lua, "return engine.fsm_trigger(fsm, 'jump')"));
    assert_eq!(eval::<String>(&lua, "return engine.fsm_current(fsm)"), "idle");

    lua.exec("player.stamina = 1").unwrap();
    assert!(eval::<bool>(&lua, "return engine.fsm_trigger(fsm, 'jump')"));
    assert_eq!(eval::<String>(&lua, "return engine.fsm_current(fsm)"), "jump");
    assert_eq!(
        eval::<Vec<String>>(&lua, "return log"),
        vec!["enter_idle:nil", "exit_idle:jump", "enter_jump:idle"]
    );
}

#[test]
fn tapped_input_moves_bound_machine() {
    let (lua, mut rt) = setup(JUMP_SCENE);
    lua.exec(
        r#"
        player.stamina = 1
        engine.fsm_bind_input(fsm, { action = "jump", phase = "pressed", from = "idle", to = "jump",
            guard = function(self, id, action, phase) return self.stamina > 0 end })
        "#,
    )
    .unwrap();
    rt.tick(0.016);
    rt.input_mut().press("jump");
    rt.tick(0.016);
    assert_eq!(eval::<String>(&lua, "return engine.fsm_current(fsm)"), "jump");
}

#[test]
fn tween_with_accessors_and_completion_chain() {
    let (lua, mut rt) = setup(
        r#"
        door = { _open = 0, done = 0 }
        function door:get_open() return self._open end
        function door:set_open(v) self._open = v end
        engine.tween{ target = door, property = "open", to = 1, duration = 0.5, easing = "cubic_out",
            on_complete = function(id)
                door.done = door.done + 1
                engine.tween{ target = door, property = "open", to = 0, duration = 0.5 }
            end }
        "#,
    );
    rt.tick(0.5);
    assert_eq!(eval::<f64>(&lua, "return door._open"), 1.0);
    assert_eq!(eval::<i64>(&lua, "return door.done"), 1);

    rt.tick(0.25);
    let open: f64 = eval(&lua, "return door._open");
    assert!((open - 0.5).abs() < 1e-4);
    rt.tick(0.25);
    assert_eq!(eval::<f64>(&lua, "return door._open"), 0.0);
    assert_eq!(rt.stats().tweens, 0);
}

#[test]
fn animation_callbacks_and_sprite_rect() {
    let (lua, mut rt) = setup(
        r#"
        frames, completions = {}, 0
        sprite = engine.sprite_create("hero", 16, 16)
        anim = engine.animation{ sprite = sprite, frames = { 0, 1, 2 }, fps = 10,
            frame_width = 16, frame_height = 16, columns = 3,
            on_frame = function(id, index, frame) table.insert(frames, frame) end,
            on_complete = function(id) completions = completions + 1 end }
        "#,
    );
    rt.tick(1.0);
    assert_eq!(eval::<Vec<i64>>(&lua, "return frames"), vec![1, 2]);
    assert_eq!(eval::<i64>(&lua, "return completions"), 1);
    assert_eq!(eval::<f64>(&lua, "return engine.sprite_rect(sprite).x"), 32.0);
    assert!(eval::<LuaValue>(&lua, "return engine.animation_get(anim)").is_nil());
}

#[test]
fn publish_from_subscriber_is_deferred() {
    let (lua, mut rt) = setup(
        r#"
        pongs = 0
        engine.subscribe("ping", function(n) engine.publish("pong", n + 1) end)
        engine.subscribe("pong", function(n) pongs = pongs + n end)
        engine.publish("ping", 1)
        "#,
    );
    rt.tick(0.016);
    assert_eq!(eval::<i64>(&lua, "return pongs"), 0);
    rt.tick(0.016);
    assert_eq!(eval::<i64>(&lua, "return pongs"), 2);
}

#[test]
fn subscriber_context_is_passed_as_self() {
    let (lua, mut rt) = setup(
        r#"
        counter = { hits = 0 }
        engine.subscribe("hit", function(self, amount) self.hits = self.hits + amount end, counter)
        engine.publish("hit", 3)
        "#,
    );
    rt.tick(0.016);
    assert_eq!(eval::<i64>(&lua, "return counter.hits"), 3);
}

#[test]
fn machine_destroying_itself_mid_update() {
    let (lua, mut rt) = setup(
        r#"
        entered = {}
        local function make(name, suicidal)
            local m = engine.fsm_create()
            engine.fsm_add_state(m, "s", { on_enter = function(id)
                table.insert(entered, name)
                if suicidal then engine.fsm_destroy(id) end
            end })
            engine.fsm_set_initial(m, "s")
            return m
        end
        a = make("a", false)
        b = make("b", true)
        c = make("c", false)
        "#,
    );
    rt.tick(0.016);
    assert_eq!(eval::<Vec<String>>(&lua, "return entered"), vec!["a", "b", "c"]);
    assert!(eval::<LuaValue>(&lua, "return engine.fsm_get(b)").is_nil());
    assert_eq!(eval::<String>(&lua, "return engine.fsm_current(c)"), "s");
    assert_eq!(rt.stats().machines, 2);
}

#[test]
fn reload_releases_lua_pins() {
    let (lua, mut rt) = setup(JUMP_SCENE);
    lua.exec("engine.subscribe('x', function() end, player)").unwrap();
    rt.tick(0.016);
    assert!(rt.engines().host.pinned_count() > 0);

    rt.clear();
    assert_eq!(rt.engines().host.pinned_count(), 0);
    assert_eq!(rt.stats().machines, 0);

    lua.exec(JUMP_SCENE).unwrap();
    rt.tick(0.016);
    assert_eq!(eval::<String>(&lua, "return engine.fsm_current(fsm)"), "idle");
}

#[test]
fn stats_table_from_lua() {
    let (lua, mut rt) = setup("engine.sprite_create('a', 1, 1)");
    rt.tick(0.016);
    assert_eq!(eval::<i64>(&lua, "return engine.stats().sprites"), 1);
}
