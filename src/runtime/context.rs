use std::io::Write;

/// Carries the output sink through evaluation. `Stringify` and the tests
/// build contexts over private buffers; the driver wires up stdout.
pub struct Context<'a> {
    output: &'a mut dyn Write,
}

impl<'a> Context<'a> {
    pub fn new(output: &'a mut dyn Write) -> Self {
        Self { output }
    }

    pub fn output(&mut self) -> &mut dyn Write {
        &mut *self.output
    }
}
