//! Evaluation of expression trees against an environment.

use super::ast::{BinaryOp, Expr, Reference};
use super::ConditionError;
use crate::environment::EvaluationEnvironment;
use dt_core::Scalar;
use std::cmp::Ordering;

pub(crate) fn evaluate(expr: &Expr, env: &EvaluationEnvironment) -> Result<Scalar, ConditionError> {
    match expr {
        Expr::Literal { value } => Ok(value.clone()),
        Expr::Reference(reference) => resolve(reference, env).cloned(),
        Expr::Logical { op, operands } => {
            // No short-circuit: every operand runs so reference errors surface eagerly.
            let mut result = *op == BinaryOp::And;
            for operand in operands {
                let truthy = evaluate(operand, env)?.is_truthy();
                result = match op {
                    BinaryOp::And => result && truthy,
                    _ => result || truthy,
                };
            }
            Ok(Scalar::Bool(result))
        }
        Expr::Binary { op, left, right } => {
            let left = evaluate(left, env)?;
            let right = evaluate(right, env)?;
            compare(*op, &left, &right).map(Scalar::Bool)
        }
    }
}

fn resolve<'a>(
    reference: &Reference,
    env: &'a EvaluationEnvironment,
) -> Result<&'a Scalar, ConditionError> {
    let snapshot =
        env.namespace(&reference.namespace)
            .ok_or_else(|| ConditionError::UndefinedReference {
                reference: reference.to_string(),
                detail: format!("namespace '{}' is not available", reference.namespace),
            })?;

    snapshot
        .get(&reference.field)
        .ok_or_else(|| ConditionError::UndefinedReference {
            reference: reference.to_string(),
            detail: format!(
                "'{}' has no attribute '{}'",
                reference.namespace, reference.field
            ),
        })
}

fn compare(op: BinaryOp, left: &Scalar, right: &Scalar) -> Result<bool, ConditionError> {
    match (left, right) {
        (Scalar::Number(a), Scalar::Number(b)) => Ok(match a.partial_cmp(b) {
            Some(ordering) => ordering_holds(op, ordering),
            // NaN compares unequal to everything, itself included.
            None => op == BinaryOp::Ne,
        }),
        (Scalar::String(a), Scalar::String(b)) => Ok(ordering_holds(op, a.cmp(b))),
        (Scalar::Bool(a), Scalar::Bool(b)) if op.is_equality() => {
            Ok(ordering_holds(op, a.cmp(b)))
        }
        _ => Err(ConditionError::TypeMismatch {
            op,
            left: left.kind(),
            right: right.kind(),
        }),
    }
}

fn ordering_holds(op: BinaryOp, ordering: Ordering) -> bool {
    match op {
        BinaryOp::Eq => ordering == Ordering::Equal,
        BinaryOp::Ne => ordering != Ordering::Equal,
        BinaryOp::Lt => ordering == Ordering::Less,
        BinaryOp::Le => ordering != Ordering::Greater,
        BinaryOp::Gt => ordering == Ordering::Greater,
        BinaryOp::Ge => ordering != Ordering::Less,
        BinaryOp::And | BinaryOp::Or => false,
    }
}

#[cfg(test)]
mod tests {
    use super::super::eval_bool;
    use super::*;
    use dt_core::{AttributeSnapshot, ScalarKind};

    fn env() -> EvaluationEnvironment {
        let mut host = AttributeSnapshot::new();
        host.insert("sys_load".to_string(), Scalar::Number(1.0));
        host.insert("mem_used_percent".to_string(), Scalar::Number(0.8));
        host.insert("status".to_string(), Scalar::from("running"));
        host.insert("enabled".to_string(), Scalar::Bool(true));
        host.insert("cpu_count".to_string(), Scalar::Number(0.0));
        host.insert("zone".to_string(), Scalar::from(""));

        let mut guest = AttributeSnapshot::new();
        guest.insert("vcpu_count".to_string(), Scalar::Number(4.0));
        guest.insert("hypervisor".to_string(), Scalar::from("kvm"));

        EvaluationEnvironment::new()
            .with_namespace("host", host)
            .with_namespace("guest", guest)
    }

    #[test]
    fn test_numeric_comparisons() {
        let env = env();
        assert!(eval_bool("host.sys_load == 1", &env).unwrap());
        assert!(eval_bool("host.sys_load != 2", &env).unwrap());
        assert!(eval_bool("host.sys_load <= 1", &env).unwrap());
        assert!(eval_bool("host.sys_load >= 1", &env).unwrap());
        assert!(!eval_bool("host.sys_load < 1", &env).unwrap());
        assert!(eval_bool("guest.vcpu_count > host.sys_load", &env).unwrap());
        assert!(eval_bool("-1 < 0", &env).unwrap());
    }

    #[test]
    fn test_string_comparisons() {
        let env = env();
        assert!(eval_bool("host.status == 'running'", &env).unwrap());
        assert!(eval_bool("guest.hypervisor != \"esxi\"", &env).unwrap());
        assert!(eval_bool("'abc' < 'abd'", &env).unwrap());
        assert!(!eval_bool("'b' <= 'a'", &env).unwrap());
    }

    #[test]
    fn test_bool_comparisons() {
        let env = env();
        assert!(eval_bool("host.enabled == true", &env).unwrap());
        assert!(eval_bool("(host.sys_load > 5) == false", &env).unwrap());

        let err = eval_bool("true < false", &env).unwrap_err();
        assert!(matches!(err, ConditionError::TypeMismatch { .. }));
    }

    #[test]
    fn test_truthiness_of_bare_operands() {
        let env = env();
        assert!(eval_bool("host.enabled", &env).unwrap());
        assert!(eval_bool("host.status", &env).unwrap());
        assert!(!eval_bool("host.zone", &env).unwrap());
        assert!(!eval_bool("host.cpu_count", &env).unwrap());
        assert!(eval_bool("host.enabled && guest.vcpu_count", &env).unwrap());
        assert!(!eval_bool("false || host.cpu_count", &env).unwrap());
    }

    #[test]
    fn test_mixed_kinds_mismatch() {
        let env = env();
        for source in [
            "host.status > 5",
            "5 == host.status",
            "host.enabled == 1",
            "host.status != true",
        ] {
            assert!(
                matches!(
                    eval_bool(source, &env),
                    Err(ConditionError::TypeMismatch { .. })
                ),
                "expected type mismatch for {}",
                source
            );
        }
    }

    #[test]
    fn test_mismatch_reports_kinds() {
        let err = eval_bool("host.enabled == 1", &env()).unwrap_err();
        assert_eq!(
            err,
            ConditionError::TypeMismatch {
                op: BinaryOp::Eq,
                left: ScalarKind::Bool,
                right: ScalarKind::Number,
            }
        );
    }

    #[test]
    fn test_undefined_field() {
        let err = eval_bool("host.nonexistent > 1", &env()).unwrap_err();
        match err {
            ConditionError::UndefinedReference { reference, detail } => {
                assert_eq!(reference, "host.nonexistent");
                assert!(detail.contains("no attribute"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_both_sides_always_evaluated() {
        let env = env();
        // Left side alone decides the result, but the right side still runs.
        let err = eval_bool("host.sys_load < 5 || guest.missing > 1", &env).unwrap_err();
        assert!(matches!(err, ConditionError::UndefinedReference { .. }));

        let err = eval_bool("host.sys_load > 5 && disk.size > 1", &env).unwrap_err();
        assert!(matches!(err, ConditionError::UndefinedReference { .. }));

        // The left error wins when both sides fail.
        let err = eval_bool("host.a > 1 || 'x' > 1", &env).unwrap_err();
        assert!(matches!(err, ConditionError::UndefinedReference { .. }));
    }

    #[test]
    fn test_long_operator_chains() {
        let env = env();

        let any = format!("{}host.enabled", "false || ".repeat(20_000));
        assert!(eval_bool(&any, &env).unwrap());

        let all = format!("{}host.cpu_count", "host.sys_load == 1 && ".repeat(20_000));
        assert!(!eval_bool(&all, &env).unwrap());

        let broken = format!("{}guest.missing", "true || ".repeat(20_000));
        assert!(matches!(
            eval_bool(&broken, &env),
            Err(ConditionError::UndefinedReference { .. })
        ));
    }

    #[test]
    fn test_nan_is_never_equal() {
        let mut host = AttributeSnapshot::new();
        host.insert("load".to_string(), Scalar::Number(f64::NAN));
        let env = EvaluationEnvironment::new().with_namespace("host", host);

        assert!(!eval_bool("host.load == host.load", &env).unwrap());
        assert!(eval_bool("host.load != 0", &env).unwrap());
        assert!(!eval_bool("host.load > 0 || host.load <= 0", &env).unwrap());
    }

    #[test]
    fn test_purity() {
        let env = env();
        let before = env.clone();
        let source = "host.sys_load > 1.5 || host.mem_used_percent > 0.7";
        let first = eval_bool(source, &env).unwrap();
        let second = eval_bool(source, &env).unwrap();
        assert_eq!(first, second);
        assert_eq!(env, before);
    }
}
