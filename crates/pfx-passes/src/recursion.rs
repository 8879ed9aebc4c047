//! Call-graph cycle rejection.
//!
//! Computes reachability over the direct call edges with a work-list and
//! blacklists every function that can reach itself, then every function
//! that calls a blacklisted one. Each disqualification is reported once,
//! when the flag flips.

use std::collections::{BTreeSet, VecDeque};

use pfx_ir::{DiagnosticReport, Module, code};

use crate::Pass;

/// Blacklists recursive functions and their callers.
#[derive(Debug)]
pub struct RecursionCheck;

impl Pass for RecursionCheck {
    fn name(&self) -> &str {
        "recursion-check"
    }

    fn run(&self, module: &mut Module, report: &mut DiagnosticReport) -> bool {
        let n = module.functions.len();
        if n == 0 {
            return false;
        }

        // Immutable edge lists, indexed by arena slot.
        let direct: Vec<Vec<usize>> = module
            .functions
            .iter()
            .map(|(_, f)| f.used_functions.iter().map(|h| h.index()).collect())
            .collect();
        let mut callers: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (caller, callees) in direct.iter().enumerate() {
            for &callee in callees {
                callers[callee].push(caller);
            }
        }

        // Transitive closure by work-list: requeue the callers of any
        // function whose reachable set grew.
        let mut reach: Vec<BTreeSet<usize>> = direct
            .iter()
            .map(|edges| edges.iter().copied().collect())
            .collect();
        let mut queued = vec![true; n];
        let mut worklist: VecDeque<usize> = (0..n).collect();
        while let Some(i) = worklist.pop_front() {
            queued[i] = false;
            let mut grown = false;
            for &callee in &direct[i] {
                let snapshot: Vec<usize> = reach[callee].iter().copied().collect();
                for g in snapshot {
                    grown |= reach[i].insert(g);
                }
            }
            if grown {
                for &caller in &callers[i] {
                    if !queued[caller] {
                        queued[caller] = true;
                        worklist.push_back(caller);
                    }
                }
            }
        }

        let handles: Vec<_> = module.functions.iter().map(|(h, _)| h).collect();
        let mut changed = false;

        // Self-reachable functions are recursive.
        for (i, &handle) in handles.iter().enumerate() {
            if reach[i].contains(&i) && !module.functions[handle].blacklisted {
                let func = &mut module.functions[handle];
                func.blacklisted = true;
                changed = true;
                report.error(
                    code::RECURSIVE_FUNCTION,
                    func.span,
                    format!("function '{}' calls itself, directly or transitively", func.name),
                );
            }
        }

        // Calling a blacklisted function disqualifies the caller as well,
        // to a fixed point.
        loop {
            let mut flipped = false;
            for (i, &handle) in handles.iter().enumerate() {
                if module.functions[handle].blacklisted {
                    continue;
                }
                let bad = direct[i]
                    .iter()
                    .find(|&&c| module.functions[handles[c]].blacklisted)
                    .copied();
                if let Some(callee) = bad {
                    let callee_name = module.functions[handles[callee]].name.clone();
                    let func = &mut module.functions[handle];
                    func.blacklisted = true;
                    flipped = true;
                    changed = true;
                    report.error(
                        code::BLACKLISTED_CALL,
                        func.span,
                        format!(
                            "function '{}' calls disqualified function '{}'",
                            func.name, callee_name
                        ),
                    );
                }
            }
            if !flipped {
                break;
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

    #[test]
    fn direct_recursion_is_blacklisted_once() {
        let mut module = module_with_edges(&["f"], &[(0, 0)]);
        let mut report = DiagnosticReport::new();
        assert!(RecursionCheck.run(&mut module, &mut report));
        let f = module.functions.iter().next().unwrap().1;
        assert!(f.blacklisted);
        assert_eq!(report.with_code(code::RECURSIVE_FUNCTION).count(), 1);
    }

    #[test]
    fn mutual_recursion_blacklists_both_with_one_error_each() {
        let mut module = module_with_edges(&["f", "g"], &[(0, 1), (1, 0)]);
        let mut report = DiagnosticReport::new();
        assert!(RecursionCheck.run(&mut module, &mut report));
        for (_, func) in module.functions.iter() {
            assert!(func.blacklisted, "{} must be blacklisted", func.name);
        }
        assert_eq!(report.with_code(code::RECURSIVE_FUNCTION).count(), 2);

        // A second run finds nothing new.
        let before = report.len();
        assert!(!RecursionCheck.run(&mut module, &mut report));
        assert_eq!(report.len(), before);
    }

    #[test]
    fn caller_of_recursive_function_is_disqualified() {
        // top -> mid -> mid (self loop)
        let mut module = module_with_edges(&["top", "mid"], &[(0, 1), (1, 1)]);
        let mut report = DiagnosticReport::new();
        assert!(RecursionCheck.run(&mut module, &mut report));
        assert_eq!(report.with_code(code::RECURSIVE_FUNCTION).count(), 1);
        assert_eq!(report.with_code(code::BLACKLISTED_CALL).count(), 1);
        for (_, func) in module.functions.iter() {
            assert!(func.blacklisted);
        }
    }

    #[test]
    fn acyclic_graph_is_untouched() {
        let mut module = module_with_edges(&["a", "b", "c"], &[(0, 1), (1, 2), (0, 2)]);
        let mut report = DiagnosticReport::new();
        assert!(!RecursionCheck.run(&mut module, &mut report));
        assert!(report.is_empty());
        for (_, func) in module.functions.iter() {
            assert!(!func.blacklisted);
        }
    }

    #[test]
    fn direct_edges_are_not_mutated() {
        let mut module = module_with_edges(&["a", "b", "c"], &[(0, 1), (1, 2)]);
        let mut report = DiagnosticReport::new();
        RecursionCheck.run(&mut module, &mut report);
        let a = module.functions.iter().next().unwrap().1;
        // Reachability of `c` from `a` must not be written back.
        assert_eq!(a.used_functions.len(), 1);
    }
}
