use crate::types::ObjRef;
use crate::vm::Vm;

/// `друк(...)`: renders each argument with `Vm::display` and writes
/// them space-separated to stdout, followed by a newline. Variadic,
/// never raises -- `to_string` always falls back to the kind name.
pub(super) fn print(vm: &mut Vm, _this: Option<ObjRef>, args: &[ObjRef]) -> Option<ObjRef> {
    let rendered: Vec<String> = args.iter().map(|&r| vm.display(r)).collect();
    println!("{}", rendered.join(" "));
    Some(vm.nil)
}
