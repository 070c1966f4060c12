// In-memory basic-block IR: functions own blocks, blocks own instructions,
// and every finished block ends in exactly one terminator.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::builder::IrBuilder;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IrType {
    Void,
    /// Integer of the given bit width (`i1` for booleans)
    Int(u32),
    /// Opaque pointer
    Ptr,
    /// Fixed-length sequence `[n x T]`
    Array(Box<IrType>, u32),
}

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrType::Void => write!(f, "void"),
            IrType::Int(bits) => write!(f, "i{bits}"),
            IrType::Ptr => write!(f, "ptr"),
            IrType::Array(elem, n) => write!(f, "[{n} x {elem}]"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub ret: IrType,
    pub params: Vec<IrType>,
    pub variadic: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FuncId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockId {
    pub func: FuncId,
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Value {
    /// Integer constant of the given width
    Int { bits: u32, value: i64 },
    /// Function-local virtual register
    Reg(u32),
    /// Incoming function argument
    Arg(u32),
    /// Address of a module global
    Global(usize),
}

impl Value {
    pub fn int(bits: u32, value: i64) -> Self {
        Value::Int { bits, value }
    }

    pub fn bool(value: bool) -> Self {
        Value::Int {
            bits: 1,
            value: value as i64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    /// Signed division
    SDiv,
    /// Signed remainder
    SRem,
    And,
    Or,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::SDiv => "sdiv",
            BinaryOp::SRem => "srem",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntPredicate {
    Eq,
    Ne,
    Slt,
    Sle,
    Sgt,
    Sge,
}

impl fmt::Display for IntPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IntPredicate::Eq => "eq",
            IntPredicate::Ne => "ne",
            IntPredicate::Slt => "slt",
            IntPredicate::Sle => "sle",
            IntPredicate::Sgt => "sgt",
            IntPredicate::Sge => "sge",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instr {
    /// `dst = alloca ty`
    Alloca { dst: u32, ty: IrType, name: String },
    /// `dst = load ty, ptr`
    Load { dst: u32, ty: IrType, ptr: Value },
    /// `store value, ptr`
    Store { ptr: Value, value: Value },
    /// `dst = &base[index]` for a value of `array_ty`
    ElementPtr {
        dst: u32,
        array_ty: IrType,
        base: Value,
        index: Value,
    },
    Binary {
        dst: u32,
        op: BinaryOp,
        lhs: Value,
        rhs: Value,
    },
    Compare {
        dst: u32,
        pred: IntPredicate,
        lhs: Value,
        rhs: Value,
    },
    Unary { dst: u32, op: UnaryOp, operand: Value },
    Call {
        dst: Option<u32>,
        func: FuncId,
        args: Vec<Value>,
    },
    Br { target: BlockId },
    CondBr {
        cond: Value,
        then_block: BlockId,
        else_block: BlockId,
    },
    Ret { value: Option<Value> },
    /// Trap for control reaching the end of a non-void function
    Unreachable,
}

impl Instr {
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Instr::Br { .. } | Instr::CondBr { .. } | Instr::Ret { .. } | Instr::Unreachable
        )
    }

    /// Blocks this instruction may transfer control to.
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Instr::Br { target } => vec![*target],
            Instr::CondBr {
                then_block,
                else_block,
                ..
            } => vec![*then_block, *else_block],
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub name: String,
    pub instrs: Vec<Instr>,
}

impl Block {
    pub fn terminator(&self) -> Option<&Instr> {
        self.instrs.last().filter(|i| i.is_terminator())
    }

    pub fn is_terminated(&self) -> bool {
        self.terminator().is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub signature: Signature,
    /// External declaration without a body
    pub is_declaration: bool,
    pub blocks: Vec<Block>,
    #[serde(skip)]
    next_reg: u32,
}

impl Function {
    pub fn block_named(&self, name: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.name == name)
    }

    /// All instructions of the function in block order.
    pub fn instrs(&self) -> impl Iterator<Item = &Instr> {
        self.blocks.iter().flat_map(|b| b.instrs.iter())
    }

    pub fn count_instrs(&self, pred: impl Fn(&Instr) -> bool) -> usize {
        self.instrs().filter(|i| pred(i)).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GlobalKind {
    Variable(IrType),
    String(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Global {
    pub name: String,
    pub kind: GlobalKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    pub functions: Vec<Function>,
    pub globals: Vec<Global>,
}

impl Module {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            functions: Vec::new(),
            globals: Vec::new(),
        }
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.functions[id.func.0].blocks[id.index]
    }

    fn value(&self, v: &Value) -> String {
        match v {
            Value::Int { bits: 1, value } => (*value != 0).to_string(),
            Value::Int { value, .. } => value.to_string(),
            Value::Reg(r) => format!("%{r}"),
            Value::Arg(a) => format!("%arg{a}"),
            Value::Global(g) => format!("@{}", self.globals[*g].name),
        }
    }

    fn label(&self, id: BlockId) -> String {
        format!("%{}", self.block(id).name)
    }

    pub fn to_lines(&self) -> Vec<String> {
        let mut out = vec![format!("; module {}", self.name)];
        for g in &self.globals {
            match &g.kind {
                GlobalKind::Variable(ty) => out.push(format!("@{} = global {ty}", g.name)),
                GlobalKind::String(s) => out.push(format!("@{} = constant {:?}", g.name, s)),
            }
        }
        for f in &self.functions {
            let mut params: Vec<String> = f.signature.params.iter().map(|p| p.to_string()).collect();
            if f.signature.variadic {
                params.push("...".to_string());
            }
            if f.is_declaration {
                out.push(format!("declare {} @{}({})", f.signature.ret, f.name, params.join(", ")));
                continue;
            }
            out.push(format!("define {} @{}({}) {{", f.signature.ret, f.name, params.join(", ")));
            for b in &f.blocks {
                out.push(format!("{}:", b.name));
                for ins in &b.instrs {
                    out.push(format!("  {}", self.instr(ins)));
                }
            }
            out.push("}".to_string());
        }
        out
    }

    fn instr(&self, ins: &Instr) -> String {
        match ins {
            Instr::Alloca { dst, ty, name } => format!("%{dst} = alloca {ty} ; {name}"),
            Instr::Load { dst, ty, ptr } => format!("%{dst} = load {ty}, {}", self.value(ptr)),
            Instr::Store { ptr, value } => {
                format!("store {}, {}", self.value(value), self.value(ptr))
            }
            Instr::ElementPtr {
                dst,
                array_ty,
                base,
                index,
            } => format!(
                "%{dst} = elementptr {array_ty}, {}, {}",
                self.value(base),
                self.value(index)
            ),
            Instr::Binary { dst, op, lhs, rhs } => {
                format!("%{dst} = {op} {}, {}", self.value(lhs), self.value(rhs))
            }
            Instr::Compare {
                dst,
                pred,
                lhs,
                rhs,
            } => format!("%{dst} = icmp {pred} {}, {}", self.value(lhs), self.value(rhs)),
            Instr::Unary { dst, op, operand } => match op {
                UnaryOp::Neg => format!("%{dst} = neg {}", self.value(operand)),
                UnaryOp::Not => format!("%{dst} = not {}", self.value(operand)),
            },
            Instr::Call { dst, func, args } => {
                let args: Vec<String> = args.iter().map(|a| self.value(a)).collect();
                let callee = &self.functions[func.0].name;
                match dst {
                    Some(d) => format!("%{d} = call @{callee}({})", args.join(", ")),
                    None => format!("call @{callee}({})", args.join(", ")),
                }
            }
            Instr::Br { target } => format!("br {}", self.label(*target)),
            Instr::CondBr {
                cond,
                then_block,
                else_block,
            } => format!(
                "br {}, {}, {}",
                self.value(cond),
                self.label(*then_block),
                self.label(*else_block)
            ),
            Instr::Ret { value: Some(v) } => format!("ret {}", self.value(v)),
            Instr::Ret { value: None } => "ret void".to_string(),
            Instr::Unreachable => "unreachable".to_string(),
        }
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.to_lines() {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

/// [`IrBuilder`] that records everything into a [`Module`].
#[derive(Debug, Default)]
pub struct ModuleBuilder {
    module: Module,
    cursor: Option<BlockId>,
}

impl ModuleBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            module: Module::new(name),
            cursor: None,
        }
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn finish(self) -> Module {
        self.module
    }

    fn cursor(&self) -> BlockId {
        match self.cursor {
            Some(b) => b,
            None => unreachable!("instruction emitted without an insertion point"),
        }
    }

    fn next_reg(&mut self) -> u32 {
        let at = self.cursor();
        let func = &mut self.module.functions[at.func.0];
        let r = func.next_reg;
        func.next_reg += 1;
        r
    }

    fn push(&mut self, ins: Instr) {
        let at = self.cursor();
        self.module.functions[at.func.0].blocks[at.index].instrs.push(ins);
    }

    fn unique_block_name(&self, func: FuncId, name: &str) -> String {
        let blocks = &self.module.functions[func.0].blocks;
        if !blocks.iter().any(|b| b.name == name) {
            return name.to_string();
        }
        let mut n = 1;
        loop {
            let candidate = format!("{name}{n}");
            if !blocks.iter().any(|b| b.name == candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    fn add_function(&mut self, name: &str, sig: &Signature, is_declaration: bool) -> FuncId {
        let id = FuncId(self.module.functions.len());
        self.module.functions.push(Function {
            name: name.to_string(),
            signature: sig.clone(),
            is_declaration,
            blocks: Vec::new(),
            next_reg: 0,
        });
        id
    }
}

impl IrBuilder for ModuleBuilder {
    fn declare_function(&mut self, name: &str, sig: &Signature) -> FuncId {
        self.add_function(name, sig, false)
    }

    fn lookup_function(&self, name: &str) -> Option<FuncId> {
        self.module
            .functions
            .iter()
            .position(|f| f.name == name)
            .map(FuncId)
    }

    fn declare_external(&mut self, name: &str, sig: &Signature) -> FuncId {
        let existing = self
            .module
            .functions
            .iter()
            .position(|f| f.name == name && f.is_declaration);
        match existing {
            Some(index) => FuncId(index),
            None => self.add_function(name, sig, true),
        }
    }

    fn param(&self, _func: FuncId, index: usize) -> Value {
        Value::Arg(index as u32)
    }

    fn finish_function(&mut self, func: FuncId) {
        for block in &mut self.module.functions[func.0].blocks {
            if !block.is_terminated() {
                block.instrs.push(Instr::Unreachable);
            }
        }
    }

    fn declare_global(&mut self, name: &str, ty: &IrType) -> Value {
        let id = self.module.globals.len();
        self.module.globals.push(Global {
            name: name.to_string(),
            kind: GlobalKind::Variable(ty.clone()),
        });
        Value::Global(id)
    }

    fn global_string(&mut self, text: &str) -> Value {
        let existing = self
            .module
            .globals
            .iter()
            .position(|g| matches!(&g.kind, GlobalKind::String(s) if s == text));
        if let Some(id) = existing {
            return Value::Global(id);
        }
        let id = self.module.globals.len();
        let strings = self
            .module
            .globals
            .iter()
            .filter(|g| matches!(g.kind, GlobalKind::String(_)))
            .count();
        self.module.globals.push(Global {
            name: format!(".str.{strings}"),
            kind: GlobalKind::String(text.to_string()),
        });
        Value::Global(id)
    }

    fn build_alloca(&mut self, ty: &IrType, name: &str) -> Value {
        // Slots live at the top of the entry block, ahead of any other code.
        let dst = self.next_reg();
        let func = self.cursor().func;
        let entry = &mut self.module.functions[func.0].blocks[0];
        let at = entry
            .instrs
            .iter()
            .take_while(|i| matches!(i, Instr::Alloca { .. }))
            .count();
        entry.instrs.insert(
            at,
            Instr::Alloca {
                dst,
                ty: ty.clone(),
                name: name.to_string(),
            },
        );
        Value::Reg(dst)
    }

    fn append_block(&mut self, func: FuncId, name: &str) -> BlockId {
        let name = self.unique_block_name(func, name);
        let blocks = &mut self.module.functions[func.0].blocks;
        blocks.push(Block {
            name,
            instrs: Vec::new(),
        });
        BlockId {
            func,
            index: blocks.len() - 1,
        }
    }

    fn position_at_end(&mut self, block: BlockId) {
        self.cursor = Some(block);
    }

    fn insert_block(&self) -> Option<BlockId> {
        self.cursor
    }

    fn is_terminated(&self, block: BlockId) -> bool {
        self.module.block(block).is_terminated()
    }

    fn build_load(&mut self, ty: &IrType, ptr: Value) -> Value {
        let dst = self.next_reg();
        self.push(Instr::Load {
            dst,
            ty: ty.clone(),
            ptr,
        });
        Value::Reg(dst)
    }

    fn build_store(&mut self, ptr: Value, value: Value) {
        self.push(Instr::Store { ptr, value });
    }

    fn build_element_ptr(&mut self, array_ty: &IrType, base: Value, index: Value) -> Value {
        let dst = self.next_reg();
        self.push(Instr::ElementPtr {
            dst,
            array_ty: array_ty.clone(),
            base,
            index,
        });
        Value::Reg(dst)
    }

    fn build_binary(&mut self, op: BinaryOp, lhs: Value, rhs: Value) -> Value {
        let dst = self.next_reg();
        self.push(Instr::Binary { dst, op, lhs, rhs });
        Value::Reg(dst)
    }

    fn build_compare(&mut self, pred: IntPredicate, lhs: Value, rhs: Value) -> Value {
        let dst = self.next_reg();
        self.push(Instr::Compare {
            dst,
            pred,
            lhs,
            rhs,
        });
        Value::Reg(dst)
    }

    fn build_unary(&mut self, op: UnaryOp, operand: Value) -> Value {
        let dst = self.next_reg();
        self.push(Instr::Unary { dst, op, operand });
        Value::Reg(dst)
    }

    fn build_call(&mut self, func: FuncId, args: Vec<Value>) -> Option<Value> {
        let returns = self.module.functions[func.0].signature.ret != IrType::Void;
        let dst = returns.then(|| self.next_reg());
        self.push(Instr::Call { dst, func, args });
        dst.map(Value::Reg)
    }

    fn build_br(&mut self, target: BlockId) {
        self.push(Instr::Br { target });
    }

    fn build_cond_br(&mut self, cond: Value, then_block: BlockId, else_block: BlockId) {
        self.push(Instr::CondBr {
            cond,
            then_block,
            else_block,
        });
    }

    fn build_return(&mut self, value: Option<Value>) {
        self.push(Instr::Ret { value });
    }
}
