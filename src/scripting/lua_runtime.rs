use crate::timing::{DEFAULT_VELOCITY, Note};
use mlua::Lua;

pub struct LuaRuntime {
    pub lua: Lua,
}

impl LuaRuntime {
    pub fn new() -> Result<Self, mlua::Error> {
        let lua = Lua::new();
        Ok(Self { lua })
    }

    /// Seeds `math.random` so generated patterns are reproducible.
    pub fn seed(&self, seed: u64) -> Result<(), mlua::Error> {
        let math: mlua::Table = self.lua.globals().get("math")?;
        let randomseed: mlua::Function = math.get("randomseed")?;
        randomseed.call::<()>(i64::from_ne_bytes(seed.to_ne_bytes()))
    }

    pub fn execute(&self, code: &str) -> Result<(), mlua::Error> {
        self.lua.load(code).exec()
    }

    pub fn execute_pattern(&self, code: &str) -> Result<Vec<Note>, mlua::Error> {
        let result: mlua::Table = self.lua.load(code).eval()?;

        let mut notes = Vec::new();
        for pair in result.sequence_values::<mlua::Table>() {
            let note_table = pair?;

            let pitch: u8 = note_table.get("pitch")?;
            let velocity: Option<u8> = note_table.get("velocity")?;
            let start_beat: f64 = note_table.get("start_beat")?;
            let duration_beats: f64 = note_table.get("duration_beats")?;

            notes.push(Note {
                pitch,
                velocity: velocity.unwrap_or(DEFAULT_VELOCITY),
                start_beat,
                duration_beats,
            });
        }

        Ok(notes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluates_note_tables() {
        let runtime = LuaRuntime::new().unwrap();
        let notes = runtime
            .execute_pattern(
                r#"
                local notes = {}
                for i = 0, 3 do
                    notes[#notes + 1] = { pitch = 60 + i, start_beat = i * 0.5, duration_beats = 0.5 }
                end
                notes[2].velocity = 40
                return notes
                "#,
            )
            .unwrap();

        assert_eq!(notes.len(), 4);
        assert_eq!(notes[0].pitch, 60);
        assert_eq!(notes[0].velocity, DEFAULT_VELOCITY);
        assert_eq!(notes[1].velocity, 40);
        assert_eq!(notes[3].start_beat, 1.5);
    }

    #[test]
    fn seeded_random_is_reproducible() {
        let code = r#"
            local notes = {}
            for i = 0, 7 do
                notes[#notes + 1] = { pitch = math.random(48, 72), start_beat = i, duration_beats = 1 }
            end
            return notes
        "#;

        let first = LuaRuntime::new().unwrap();
        first.seed(42).unwrap();
        let second = LuaRuntime::new().unwrap();
        second.seed(42).unwrap();

        assert_eq!(
            first.execute_pattern(code).unwrap(),
            second.execute_pattern(code).unwrap()
        );
    }

    #[test]
    fn accepts_seeds_above_i64_max() {
        let code = "return { { pitch = math.random(48, 72), start_beat = 0, duration_beats = 1 } }";

        let first = LuaRuntime::new().unwrap();
        first.seed(u64::MAX).unwrap();
        let second = LuaRuntime::new().unwrap();
        second.seed(u64::MAX).unwrap();

        assert_eq!(
            first.execute_pattern(code).unwrap(),
            second.execute_pattern(code).unwrap()
        );
    }

    #[test]
    fn missing_field_is_an_error() {
        let runtime = LuaRuntime::new().unwrap();
        let result = runtime.execute_pattern("return { { pitch = 60, start_beat = 0 } }");
        assert!(result.is_err());
    }

    #[test]
    fn executes_setup_chunks() {
        let runtime = LuaRuntime::new().unwrap();
        runtime.execute("ROOT = 57").unwrap();
        let notes = runtime
            .execute_pattern("return { { pitch = ROOT, start_beat = 0, duration_beats = 2 } }")
            .unwrap();
        assert_eq!(notes[0].pitch, 57);
    }
}
