use super::module::{BinaryOp, BlockId, FuncId, IntPredicate, IrType, Signature, UnaryOp, Value};

/// Code-generation backend driven by the lowering pass.
///
/// The backend owns functions, blocks and storage; the pass only holds the
/// returned handles. Instructions are appended at the current insertion
/// point, which the pass moves explicitly with [`IrBuilder::position_at_end`].
pub trait IrBuilder {
    /// Define a module-level function; blocks are appended to it afterwards.
    fn declare_function(&mut self, name: &str, sig: &Signature) -> FuncId;
    fn lookup_function(&self, name: &str) -> Option<FuncId>;
    /// Declare an external function, or return the existing one of that name.
    fn declare_external(&mut self, name: &str, sig: &Signature) -> FuncId;
    fn param(&self, func: FuncId, index: usize) -> Value;
    /// Called once the pass is done with a function. Blocks still lacking a
    /// terminator are the backend's to close (e.g. with a trap).
    fn finish_function(&mut self, func: FuncId);

    /// Module-level storage; returns its address.
    fn declare_global(&mut self, name: &str, ty: &IrType) -> Value;
    /// Constant NUL-terminated string; returns its address.
    fn global_string(&mut self, text: &str) -> Value;
    /// Function-local storage in the current function; returns its address.
    fn build_alloca(&mut self, ty: &IrType, name: &str) -> Value;

    fn append_block(&mut self, func: FuncId, name: &str) -> BlockId;
    fn position_at_end(&mut self, block: BlockId);
    fn insert_block(&self) -> Option<BlockId>;
    fn is_terminated(&self, block: BlockId) -> bool;

    fn build_load(&mut self, ty: &IrType, ptr: Value) -> Value;
    fn build_store(&mut self, ptr: Value, value: Value);
    /// Address of element `index` of the array of type `array_ty` at `base`.
    fn build_element_ptr(&mut self, array_ty: &IrType, base: Value, index: Value) -> Value;
    fn build_binary(&mut self, op: BinaryOp, lhs: Value, rhs: Value) -> Value;
    fn build_compare(&mut self, pred: IntPredicate, lhs: Value, rhs: Value) -> Value;
    fn build_unary(&mut self, op: UnaryOp, operand: Value) -> Value;
    /// Returns the call's result, or `None` for a void callee.
    fn build_call(&mut self, func: FuncId, args: Vec<Value>) -> Option<Value>;

    fn build_br(&mut self, target: BlockId);
    fn build_cond_br(&mut self, cond: Value, then_block: BlockId, else_block: BlockId);
    fn build_return(&mut self, value: Option<Value>);
}
