//! Stage usage and validity closure.
//!
//! Entry points seed `used_as_vertex` / `used_as_pixel` on their root
//! functions; this pass pushes usage down the call graph and validity up
//! it, then blacklists every used function with a direct callee that is
//! not capable in that stage. The incapable callee itself is left alone,
//! so uses of it from the stage it does support stay legal. Usage only
//! grows and validity only shrinks, so the closure reaches a fixed point.

use pfx_ir::{DiagnosticReport, Module, code};

use crate::Pass;

/// Propagates stage usage/validity and rejects mismatched calls.
#[derive(Debug)]
pub struct StageUsage;

impl Pass for StageUsage {
    fn name(&self) -> &str {
        "stage-usage"
    }

    fn run(&self, module: &mut Module, report: &mut DiagnosticReport) -> bool {
        let handles: Vec<_> = module.functions.iter().map(|(h, _)| h).collect();
        let mut changed = false;

        loop {
            let mut flipped = false;
            for &handle in &handles {
                let callees = module.functions[handle].used_functions.clone();
                let used_vertex = module.functions[handle].used_as_vertex;
                let used_pixel = module.functions[handle].used_as_pixel;

                // Usage flows from caller to callee.
                for &callee in &callees {
                    let func = &mut module.functions[callee];
                    if used_vertex && !func.used_as_vertex {
                        func.used_as_vertex = true;
                        flipped = true;
                    }
                    if used_pixel && !func.used_as_pixel {
                        func.used_as_pixel = true;
                        flipped = true;
                    }
                }

                // Validity flows from callee to caller.
                let mut valid_vertex = module.functions[handle].valid_for_vertex;
                let mut valid_pixel = module.functions[handle].valid_for_pixel;
                for &callee in &callees {
                    valid_vertex &= module.functions[callee].valid_for_vertex;
                    valid_pixel &= module.functions[callee].valid_for_pixel;
                }
                let func = &mut module.functions[handle];
                if func.valid_for_vertex != valid_vertex {
                    func.valid_for_vertex = valid_vertex;
                    flipped = true;
                }
                if func.valid_for_pixel != valid_pixel {
                    func.valid_for_pixel = valid_pixel;
                    flipped = true;
                }
            }
            if !flipped {
                break;
            }
            changed = true;
        }

        // A used function must have every direct callee capable in the same
        // stage. Already-blacklisted functions were reported elsewhere.
        for &handle in &handles {
            let func = &module.functions[handle];
            if func.blacklisted {
                continue;
            }
            let vertex_clash = func.used_as_vertex
                && func
                    .used_functions
                    .iter()
                    .any(|&c| !module.functions[c].valid_for_vertex);
            let pixel_clash = func.used_as_pixel
                && func
                    .used_functions
                    .iter()
                    .any(|&c| !module.functions[c].valid_for_pixel);
            if vertex_clash {
                let callee = module.functions[handle]
                    .used_functions
                    .iter()
                    .copied()
                    .find(|&c| !module.functions[c].valid_for_vertex)
                    .map(|c| module.functions[c].name.clone())
                    .unwrap_or_default();
                let func = &mut module.functions[handle];
                func.blacklisted = true;
                changed = true;
                report.error(
                    code::VERTEX_STAGE_MISMATCH,
                    func.span,
                    format!(
                        "function '{}' is used by a vertex shader but calls '{}', which is not vertex-capable",
                        func.name, callee
                    ),
                );
            } else if pixel_clash {
                let callee = module.functions[handle]
                    .used_functions
                    .iter()
                    .copied()
                    .find(|&c| !module.functions[c].valid_for_pixel)
                    .map(|c| module.functions[c].name.clone())
                    .unwrap_or_default();
                let func = &mut module.functions[handle];
                func.blacklisted = true;
                changed = true;
                report.error(
                    code::PIXEL_STAGE_MISMATCH,
                    func.span,
                    format!(
                        "function '{}' is used by a pixel shader but calls '{}', which is not pixel-capable",
                        func.name, callee
                    ),
                );
            }
        }

        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pfx_ir::{FunctionDecl, Span};

    fn module_with_edges(names: &[&str], edges: &[(usize, usize)]) -> Module {
        let mut module = Module::new();
        let handles: Vec<_> = names
            .iter()
            .map(|name| module.functions.append(FunctionDecl::new(*name, Span::NONE)))
            .collect();
        for &(from, to) in edges {
            let target = handles[to];
            module.functions[handles[from]].add_used(target);
        }
        module
    }

    fn function_named<'a>(module: &'a Module, name: &str) -> &'a FunctionDecl {
        module
            .functions
            .iter()
            .map(|(_, f)| f)
            .find(|f| f.name == name)
            .unwrap()
    }

    #[test]
    fn usage_propagates_to_leaves() {
        // main -> helper -> leaf, main used as vertex.
        let mut module = module_with_edges(&["main", "helper", "leaf"], &[(0, 1), (1, 2)]);
        let main = module.functions.iter().next().unwrap().0;
        module.functions[main].used_as_vertex = true;

        let mut report = DiagnosticReport::new();
        assert!(StageUsage.run(&mut module, &mut report));
        assert!(report.is_empty());
        assert!(function_named(&module, "leaf").used_as_vertex);
        assert!(!function_named(&module, "leaf").used_as_pixel);
    }

    #[test]
    fn callers_of_a_pixel_only_function_are_disqualified() {
        // main -> helper -> sample, sample not valid for vertex.
        let mut module = module_with_edges(&["main", "helper", "sample"], &[(0, 1), (1, 2)]);
        let handles: Vec<_> = module.functions.iter().map(|(h, _)| h).collect();
        module.functions[handles[0]].used_as_vertex = true;
        module.functions[handles[2]].valid_for_vertex = false;

        let mut report = DiagnosticReport::new();
        assert!(StageUsage.run(&mut module, &mut report));
        assert_eq!(report.with_code(code::VERTEX_STAGE_MISMATCH).count(), 2);
        assert!(function_named(&module, "main").blacklisted);
        assert!(function_named(&module, "helper").blacklisted);
        // The callee keeps its standing for the stages it does support.
        assert!(!function_named(&module, "sample").blacklisted);

        // Running again must not duplicate any diagnostic.
        let before = report.len();
        assert!(!StageUsage.run(&mut module, &mut report));
        assert_eq!(report.len(), before);
    }

    #[test]
    fn pixel_usage_of_pixel_only_function_is_fine() {
        let mut module = module_with_edges(&["shade", "sample"], &[(0, 1)]);
        let handles: Vec<_> = module.functions.iter().map(|(h, _)| h).collect();
        module.functions[handles[0]].used_as_pixel = true;
        module.functions[handles[1]].valid_for_vertex = false;

        let mut report = DiagnosticReport::new();
        StageUsage.run(&mut module, &mut report);
        assert!(report.is_empty());
        assert!(!function_named(&module, "shade").blacklisted);
        assert!(!function_named(&module, "sample").blacklisted);
    }

    #[test]
    fn clash_in_both_stages_reports_the_caller_once() {
        // caller -> leaf, leaf capable in neither stage, caller used in both.
        let mut module = module_with_edges(&["caller", "leaf"], &[(0, 1)]);
        let handles: Vec<_> = module.functions.iter().map(|(h, _)| h).collect();
        module.functions[handles[0]].used_as_vertex = true;
        module.functions[handles[0]].used_as_pixel = true;
        module.functions[handles[1]].valid_for_vertex = false;
        module.functions[handles[1]].valid_for_pixel = false;

        let mut report = DiagnosticReport::new();
        StageUsage.run(&mut module, &mut report);
        assert_eq!(report.len(), 1);
        assert!(function_named(&module, "caller").blacklisted);
    }

    #[test]
    fn already_blacklisted_functions_are_not_reported_again() {
        let mut module = module_with_edges(&["caller", "leaf"], &[(0, 1)]);
        let handles: Vec<_> = module.functions.iter().map(|(h, _)| h).collect();
        module.functions[handles[0]].used_as_vertex = true;
        module.functions[handles[0]].blacklisted = true;
        module.functions[handles[1]].valid_for_vertex = false;

        let mut report = DiagnosticReport::new();
        StageUsage.run(&mut module, &mut report);
        assert!(report.is_empty());
    }

    #[test]
    fn validity_propagates_upward_without_usage() {
        let mut module = module_with_edges(&["outer", "inner"], &[(0, 1)]);
        let handles: Vec<_> = module.functions.iter().map(|(h, _)| h).collect();
        module.functions[handles[1]].valid_for_pixel = false;

        let mut report = DiagnosticReport::new();
        StageUsage.run(&mut module, &mut report);
        assert!(report.is_empty());
        assert!(!function_named(&module, "outer").valid_for_pixel);
        assert!(function_named(&module, "outer").valid_for_vertex);
    }
}
