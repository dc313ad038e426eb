//! Shared test harness: compiles source text through the whole pipeline
//! and executes the resulting SSA module with a small interpreter so the
//! end-to-end scenarios can assert on actual computed exit values.

use mmoc::ir::{BlockId, CmpOp, Constant, InstrKind, Module, Terminator, VReg};
use mmoc::preprocessor::Preprocessor;
use std::collections::HashMap;

/// Parse, build and lower source text to a verified module.
pub fn compile(source: &str) -> Module {
    let (tree, errors) = mmoc::parser::parse(source);
    assert!(errors.is_empty(), "parse errors: {:?}", errors);
    let tu = mmoc::ast_builder::build_translation_unit(&tree).expect("AST build failed");
    mmoc::ir::lower_translation_unit(&tu).expect("IR lowering failed")
}

/// Compile and execute `main`, returning its exit value.
pub fn run_main(source: &str) -> i64 {
    let module = compile(source);
    Interp::new(&module).call("main", &[])
}

/// Preprocess first, then compile and execute `main`.
pub fn run_main_preprocessed(source: &str) -> i64 {
    let text = Preprocessor::new()
        .preprocess_str(source)
        .expect("preprocessing failed");
    run_main(&text)
}

/// A direct interpreter over the SSA module. Values are i64; stack slots
/// and globals live in one flat memory, addressed by cell index.
pub struct Interp<'m> {
    module: &'m Module,
    memory: Vec<i64>,
    globals: HashMap<String, i64>,
    fuel: u64,
}

impl<'m> Interp<'m> {
    pub fn new(module: &'m Module) -> Self {
        let mut interp = Self {
            module,
            memory: Vec::new(),
            globals: HashMap::new(),
            fuel: 10_000_000,
        };
        for global in &module.globals {
            let addr = interp.memory.len() as i64;
            match &global.init {
                Constant::Str(s) => {
                    for b in s.bytes() {
                        interp.memory.push(b as i64);
                    }
                    interp.memory.push(0);
                }
                Constant::Int(v) => interp.memory.push(*v),
                Constant::Bool(b) => interp.memory.push(*b as i64),
                Constant::Float(f) => interp.memory.push(*f as i64),
            }
            interp.globals.insert(global.name.clone(), addr);
        }
        interp
    }

    /// Execute a defined function by name.
    pub fn call(&mut self, name: &str, args: &[i64]) -> i64 {
        let func = self
            .module
            .function(name)
            .unwrap_or_else(|| panic!("no function '{}'", name));
        assert!(!func.is_declaration, "cannot execute declaration '{}'", name);

        let mut regs: HashMap<VReg, i64> = HashMap::new();
        for ((vreg, _), value) in func.params.iter().zip(args.iter()) {
            regs.insert(*vreg, *value);
        }

        let mut current = func
            .entry_block()
            .unwrap_or_else(|| panic!("function '{}' has no entry block", name))
            .id;
        let mut previous: Option<BlockId> = None;

        loop {
            let block = func
                .block(current)
                .unwrap_or_else(|| panic!("missing block {} in '{}'", current, name));

            for instr in &block.instructions {
                self.fuel = self
                    .fuel
                    .checked_sub(1)
                    .expect("interpreter ran out of fuel");
                let value = self.eval(&instr.kind, &regs, previous);
                if let Some(result) = instr.result {
                    regs.insert(result, value);
                }
            }

            match block
                .terminator
                .as_ref()
                .unwrap_or_else(|| panic!("unterminated block {} in '{}'", current, name))
            {
                Terminator::Ret(None) => return 0,
                Terminator::Ret(Some(v)) => return regs[v],
                Terminator::Br(target) => {
                    previous = Some(current);
                    current = *target;
                }
                Terminator::CondBr {
                    cond,
                    then_block,
                    else_block,
                } => {
                    previous = Some(current);
                    current = if regs[cond] != 0 {
                        *then_block
                    } else {
                        *else_block
                    };
                }
            }
        }
    }

    fn eval(
        &mut self,
        kind: &InstrKind,
        regs: &HashMap<VReg, i64>,
        previous: Option<BlockId>,
    ) -> i64 {
        let get = |v: &VReg| regs[v];
        match kind {
            InstrKind::Const(Constant::Int(v)) => *v,
            InstrKind::Const(Constant::Bool(b)) => *b as i64,
            InstrKind::Const(Constant::Float(f)) => *f as i64,
            InstrKind::Const(Constant::Str(_)) => 0,

            InstrKind::Add(a, b) => get(a).wrapping_add(get(b)),
            InstrKind::Sub(a, b) => get(a).wrapping_sub(get(b)),
            InstrKind::Mul(a, b) => get(a).wrapping_mul(get(b)),
            InstrKind::SDiv(a, b) => {
                let d = get(b);
                if d == 0 { 0 } else { get(a).wrapping_div(d) }
            }
            InstrKind::SRem(a, b) => {
                let d = get(b);
                if d == 0 { 0 } else { get(a).wrapping_rem(d) }
            }
            InstrKind::Neg(v) => get(v).wrapping_neg(),

            InstrKind::And(a, b) => get(a) & get(b),
            InstrKind::Or(a, b) => get(a) | get(b),
            InstrKind::Xor(a, b) => get(a) ^ get(b),
            InstrKind::Shl(a, b) => get(a).wrapping_shl(get(b) as u32 & 63),
            InstrKind::AShr(a, b) => get(a).wrapping_shr(get(b) as u32 & 63),
            InstrKind::Not(v) => !get(v),

            InstrKind::ICmp(op, a, b) => {
                let (x, y) = (get(a), get(b));
                let result = match op {
                    CmpOp::Eq => x == y,
                    CmpOp::Ne => x != y,
                    CmpOp::Slt => x < y,
                    CmpOp::Sle => x <= y,
                    CmpOp::Sgt => x > y,
                    CmpOp::Sge => x >= y,
                };
                result as i64
            }
            InstrKind::ZExt(v, _) => get(v),

            InstrKind::Alloca(_) => {
                self.memory.push(0);
                (self.memory.len() - 1) as i64
            }
            InstrKind::Load(ptr, _) => self.memory[get(ptr) as usize],
            InstrKind::Store(ptr, value) => {
                let addr = get(ptr) as usize;
                self.memory[addr] = get(value);
                0
            }

            InstrKind::Call { func, args } => {
                let arg_values: Vec<i64> = args.iter().map(get).collect();
                self.call(func, &arg_values)
            }
            InstrKind::GlobalRef(name) => self.globals[name],
            InstrKind::FuncRef(_) => 0,

            InstrKind::Phi(_, preds) => {
                let pred = previous.expect("phi in entry block");
                preds
                    .iter()
                    .find(|(_, block)| *block == pred)
                    .map(|(value, _)| get(value))
                    .expect("phi has no input for predecessor")
            }
        }
    }
}
