#![no_main]

use std::io;

use libfuzzer_sys::fuzz_target;

use itergen::bound::BoundProgram;
use itergen::errors::Diagnostics;
use itergen::interp::echo::{self, RunOptions};
use itergen::lower::{self, LoweringOptions};

fuzz_target!(|code: &[u8]| {
    let Ok(text) = std::str::from_utf8(code) else { return };
    let Ok(program) = ron::from_str::<BoundProgram>(text) else { return };

    let mut diagnostics = Diagnostics::new();
    let output = lower::lower_methods(
        &program.methods,
        &LoweringOptions::default(),
        &mut diagnostics,
    );

    let options = RunOptions {
        args: vec![3],
        limit: Some(16),
        fuel: Some(10_000),
    };
    let _ = echo::run_program(&output, &options, io::sink());
});
