//! Flat validator list to App → Model → Validator tree.

use crate::models::{AppSummary, AppTree, ModelSummary, Status, Validator};

/// Group `validators` by app and model and compute every roll-up status.
///
/// Pure and O(n): the first pass groups, preserving input order inside each
/// model; the second lifts statuses bottom-up. Exception dominates Failing,
/// which dominates Passing. Warning and Uninitialized members leave the
/// parent Passing.
pub fn aggregate(validators: &[Validator]) -> AppTree<'_> {
    let mut tree = AppTree::new();

    for validator in validators {
        let app = tree
            .entry(validator.app_label.as_str())
            .or_insert_with(|| AppSummary::new(&validator.app_label));
        app.models
            .entry(validator.model_name.as_str())
            .or_insert_with(|| ModelSummary::new(&validator.app_label, &validator.model_name))
            .validators
            .push(validator);
    }

    for app in tree.values_mut() {
        for model in app.models.values_mut() {
            model.status = roll_up(model.validators.iter().map(|v| v.status));
        }
        app.status = roll_up(app.models.values().map(|m| m.status));
    }

    tree
}

/// Roll-up of child statuses; Passing when no child is Failing or Exception.
pub fn roll_up(children: impl IntoIterator<Item = Status>) -> Status {
    let mut status = Status::Passing;
    for child in children {
        match child {
            Status::Exception => return Status::Exception,
            Status::Failing => status = Status::Failing,
            _ => {}
        }
    }
    status
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::validator;

    #[test]
    fn test_empty_input() {
        assert!(aggregate(&[]).is_empty());
    }

    #[test]
    fn test_failing_rolls_up() {
        let validators = vec![
            validator(1, "A", "M", Status::Passing),
            validator(2, "A", "M", Status::Failing),
        ];
        let tree = aggregate(&validators);
        assert_eq!(tree["A"].models["M"].status, Status::Failing);
        assert_eq!(tree["A"].status, Status::Failing);
    }

    #[test]
    fn test_exception_dominates_regardless_of_position() {
        let validators = vec![
            validator(1, "A", "M", Status::Exception),
            validator(2, "A", "M", Status::Failing),
            validator(3, "A", "N", Status::Failing),
            validator(4, "B", "M", Status::Failing),
            validator(5, "B", "N", Status::Exception),
        ];
        let tree = aggregate(&validators);
        assert_eq!(tree["A"].models["M"].status, Status::Exception);
        assert_eq!(tree["A"].models["N"].status, Status::Failing);
        assert_eq!(tree["A"].status, Status::Exception);
        assert_eq!(tree["B"].models["M"].status, Status::Failing);
        assert_eq!(tree["B"].status, Status::Exception);
    }

    #[test]
    fn test_all_passing() {
        let validators = vec![
            validator(1, "A", "M", Status::Passing),
            validator(2, "A", "N", Status::Uninitialized),
            validator(3, "A", "N", Status::Warning),
        ];
        let tree = aggregate(&validators);
        assert_eq!(tree["A"].models["N"].status, Status::Passing);
        assert_eq!(tree["A"].status, Status::Passing);
    }

    #[test]
    fn test_grouping_is_exact() {
        let validators = vec![
            validator(1, "A", "M", Status::Passing),
            validator(2, "B", "M", Status::Passing),
            validator(3, "A", "N", Status::Passing),
            validator(4, "A", "M", Status::Failing),
            validator(5, "B", "M", Status::Passing),
        ];
        let tree = aggregate(&validators);

        let ids = |app: &str, model: &str| -> Vec<u64> {
            tree[app].models[model].validators.iter().map(|v| v.id).collect()
        };
        assert_eq!(ids("A", "M"), vec![1, 4]);
        assert_eq!(ids("A", "N"), vec![3]);
        assert_eq!(ids("B", "M"), vec![2, 5]);

        let total: usize = tree.values().map(|a| a.validator_count()).sum();
        assert_eq!(total, validators.len());
        for app in tree.values() {
            for model in app.models.values() {
                assert!(model.validators.iter().all(|v| v.app_label == app.app_label
                    && v.model_name == model.model_name));
            }
        }
    }

    #[test]
    fn test_first_seen_order_and_determinism() {
        let validators = vec![
            validator(1, "zoo", "Lion", Status::Passing),
            validator(2, "farm", "Cow", Status::Failing),
            validator(3, "zoo", "Bear", Status::Passing),
        ];
        let tree = aggregate(&validators);
        assert_eq!(tree.keys().copied().collect::<Vec<_>>(), vec!["zoo", "farm"]);
        assert_eq!(
            tree["zoo"].models.keys().copied().collect::<Vec<_>>(),
            vec!["Lion", "Bear"]
        );
        assert_eq!(aggregate(&validators), tree);
    }

    #[test]
    fn test_roll_up_empty_is_passing() {
        assert_eq!(roll_up([]), Status::Passing);
    }
}
