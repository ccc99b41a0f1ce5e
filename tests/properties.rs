#![allow(missing_docs)]
//! Property tests for launch assembly and span nesting.

mod common;

use common::{configure, launch, memory_dispatcher, plain, setup_argument};
use launchspan::{
    ArgToken, CallContextAssembler, CallPhase, Dim3, EngineError, ProtocolViolation, StreamHandle,
};
use proptest::prelude::*;

fn arb_dim() -> impl Strategy<Value = Dim3> {
    (1u32..1024, 1u32..64, 1u32..8).prop_map(|(x, y, z)| Dim3::new(x, y, z))
}

/// One step of an arbitrary launch-protocol stream.
#[derive(Debug, Clone)]
enum Step {
    Configure(CallPhase),
    Bind(CallPhase, usize),
    Launch(CallPhase),
}

fn arb_phase() -> impl Strategy<Value = CallPhase> {
    prop_oneof![Just(CallPhase::Enter), Just(CallPhase::Exit)]
}

fn arb_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        arb_phase().prop_map(Step::Configure),
        (arb_phase(), any::<usize>()).prop_map(|(p, a)| Step::Bind(p, a)),
        arb_phase().prop_map(Step::Launch),
    ]
}

proptest! {
    #[test]
    fn consumed_descriptor_matches_configuration(
        grid in arb_dim(),
        block in arb_dim(),
        shared_mem in 0u64..65536,
        stream in any::<u64>(),
        args in proptest::collection::vec(any::<usize>(), 0..24),
    ) {
        let mut asm = CallContextAssembler::new();
        asm.on_configure(CallPhase::Enter, grid, block, shared_mem, StreamHandle(stream)).unwrap();
        for &arg in &args {
            asm.on_bind_argument(CallPhase::Enter, ArgToken(arg)).unwrap();
        }
        let seen = asm.on_launch(CallPhase::Enter).unwrap();
        let consumed = asm.on_launch(CallPhase::Exit).unwrap();
        prop_assert_eq!(&seen, &consumed);
        prop_assert_eq!(consumed.grid(), grid);
        prop_assert_eq!(consumed.block(), block);
        prop_assert_eq!(consumed.shared_mem(), shared_mem);
        prop_assert_eq!(consumed.stream(), StreamHandle(stream));
        let tokens: Vec<usize> = consumed.args().iter().map(|a| a.0).collect();
        prop_assert_eq!(tokens, args);
        prop_assert!(!asm.is_valid());
    }

    #[test]
    fn launch_exit_always_resets(steps in proptest::collection::vec(arb_step(), 0..40)) {
        let mut asm = CallContextAssembler::new();
        for step in steps {
            match step {
                Step::Configure(phase) => {
                    let was_valid = asm.is_valid();
                    let before = asm.snapshot();
                    let result = asm.on_configure(phase, Dim3::default(), Dim3::default(), 0, StreamHandle::DEFAULT);
                    if phase.is_enter() && was_valid {
                        prop_assert_eq!(result, Err(ProtocolViolation::AlreadyConfigured));
                        prop_assert_eq!(asm.snapshot(), before);
                    } else {
                        prop_assert!(result.is_ok());
                    }
                }
                Step::Bind(phase, arg) => {
                    let result = asm.on_bind_argument(phase, ArgToken(arg));
                    if phase.is_enter() && !asm.is_valid() {
                        prop_assert_eq!(result, Err(ProtocolViolation::ArgumentBeforeConfigure));
                    } else {
                        prop_assert!(result.is_ok());
                    }
                }
                Step::Launch(phase) => {
                    let _ = asm.on_launch(phase);
                    if !phase.is_enter() {
                        prop_assert!(!asm.is_valid());
                        prop_assert!(asm.snapshot().is_none());
                    }
                }
            }
        }
    }

    #[test]
    fn nested_calls_parent_on_their_caller(depth in 1usize..40) {
        let (sink, tracer, dispatcher) = memory_dispatcher();
        let mut ctx = dispatcher.new_context();
        let mut opened = Vec::with_capacity(depth);
        for level in 0..depth {
            let report = dispatcher.process(&mut ctx, &plain(CallPhase::Enter, &format!("L{level}")));
            opened.push(report.opened.unwrap());
        }
        prop_assert_eq!(ctx.spans().depth(), depth);
        for expected in opened.iter().rev() {
            let report = dispatcher.process(&mut ctx, &plain(CallPhase::Exit, "x"));
            prop_assert_eq!(report.closed, Some(*expected));
        }
        prop_assert!(ctx.spans().is_empty());

        let mut parent = tracer.root();
        for span in opened {
            prop_assert_eq!(sink.span(span).unwrap().parent, Some(parent));
            parent = span;
        }
    }

    #[test]
    fn depth_never_goes_negative(phases in proptest::collection::vec(arb_phase(), 0..64)) {
        let (_sink, _tracer, dispatcher) = memory_dispatcher();
        let mut ctx = dispatcher.new_context();
        let mut model: usize = 0;
        for phase in phases {
            let report = dispatcher.process(&mut ctx, &plain(phase, "call"));
            if phase.is_enter() {
                model += 1;
            } else if model == 0 {
                prop_assert_eq!(report.errors.as_slice(), &[EngineError::StackUnderflow]);
            } else {
                model -= 1;
                prop_assert!(report.closed.is_some());
            }
            prop_assert_eq!(ctx.spans().depth(), model);
        }
    }

    #[test]
    fn dispatcher_reports_match_assembler(
        args in proptest::collection::vec(1usize..usize::MAX, 0..8),
        symbol in "[a-zA-Z_][a-zA-Z0-9_]{0,16}",
    ) {
        let (sink, _tracer, dispatcher) = memory_dispatcher();
        let mut ctx = dispatcher.new_context();
        dispatcher.process(&mut ctx, &configure(CallPhase::Enter, (4, 1, 1), (128, 1, 1)));
        for &arg in &args {
            dispatcher.process(&mut ctx, &setup_argument(CallPhase::Enter, arg));
            dispatcher.process(&mut ctx, &setup_argument(CallPhase::Exit, arg));
        }
        let entered = dispatcher.process(&mut ctx, &launch(CallPhase::Enter, &symbol));
        let span = sink.span(entered.opened.unwrap()).unwrap();
        let argc = args.len().to_string();
        prop_assert_eq!(span.tag("kernel.argc"), Some(argc.as_str()));
        prop_assert_eq!(span.tag("kernel.symbol"), Some(symbol.as_str()));
        dispatcher.process(&mut ctx, &launch(CallPhase::Exit, &symbol));
        dispatcher.process(&mut ctx, &configure(CallPhase::Exit, (4, 1, 1), (128, 1, 1)));
        prop_assert!(ctx.is_idle());
    }
}
