#[path = "fixture.rs"]
#[allow(dead_code)]
mod fixture;

use fixture::{convert_to_string, serialize, try_convert, Fixture};
use mantle_compiler::emit::{EmitError, EmitterContext, ExpressionConverter};
use mantle_compiler::semantics::metadata::ResourceAncestor;
use mantle_compiler::semantics::{EmitterSettings, LocalKind, LoopParent};

#[cfg(test)]
mod index_replacement {
    use super::*;

    #[test]
    fn should_keep_conversion_unchanged_when_no_locals_leave_scope() {
        let mut f = Fixture::new();
        let name = f.string("w1");
        let resource = f.declared_resource("widget", "My.Rp/widgets", "2023-01-01", name);
        let base = f.resource_access("widget", resource);
        let syntax = f.property_access(base, "id");

        let context = EmitterContext::new(&f.model, EmitterSettings::default());
        let converter = ExpressionConverter::new(&context);
        let replacement = converter
            .try_get_replacement_context_for_resource(resource, None, syntax.node_id())
            .unwrap();
        assert!(replacement.is_none());

        assert_eq!(
            convert_to_string(&f.model, &syntax),
            "[resourceId('My.Rp/widgets', 'w1')]"
        );
    }

    #[test]
    fn should_substitute_item_local_with_indexed_source_array() {
        let mut f = Fixture::new();
        let source = f.parameter_access("items");
        let for_loop = f.add_loop(source, LoopParent::ResourceDeclaration);
        let item = f.local("item", LocalKind::Item, for_loop);

        let name = f.access("item", item);
        let resource = f.declared_collection("widgets", "My.Rp/widgets", "2023-01-01", name);

        let base = f.resource_access("widgets", resource);
        let index = f.int(3);
        let element = f.array_access(base, index);
        let syntax = f.property_access(element, "id");

        assert_eq!(
            convert_to_string(&f.model, &syntax),
            "[resourceId('My.Rp/widgets', parameters('items')[3])]"
        );
    }

    #[test]
    fn should_substitute_index_local_with_index_expression() {
        let mut f = Fixture::new();
        let source = f.parameter_access("items");
        let for_loop = f.add_loop(source, LoopParent::ResourceDeclaration);
        let index_local = f.local("i", LocalKind::Index, for_loop);

        let index_access = f.access("i", index_local);
        let name = f.interpolated(&["w", ""], vec![index_access]);
        let resource = f.declared_collection("widgets", "My.Rp/widgets", "2023-01-01", name);

        let base = f.resource_access("widgets", resource);
        let index = f.int(5);
        let element = f.array_access(base, index);
        let syntax = f.property_access(element, "name");

        assert_eq!(convert_to_string(&f.model, &syntax), "[format('w{0}', 5)]");
    }

    #[test]
    fn should_fail_when_locals_span_multiple_loops() {
        let mut f = Fixture::new();
        let first_source = f.parameter_access("outer");
        let first_loop = f.add_loop(first_source, LoopParent::ResourceDeclaration);
        let first_item = f.local("a", LocalKind::Item, first_loop);

        let second_source = f.parameter_access("inner");
        let second_loop = f.add_loop(second_source, LoopParent::ResourceDeclaration);
        let second_item = f.local("b", LocalKind::Item, second_loop);

        let left = f.access("a", first_item);
        let right = f.access("b", second_item);
        let name = f.interpolated(&["", "-", ""], vec![left, right]);
        let resource = f.declared_collection("widgets", "My.Rp/widgets", "2023-01-01", name);

        let base = f.resource_access("widgets", resource);
        let index = f.int(0);
        let element = f.array_access(base, index);
        let syntax = f.property_access(element, "id");

        assert!(matches!(
            try_convert(&f.model, &syntax).unwrap_err(),
            EmitError::AmbiguousIndexReplacement
        ));
    }
}

#[cfg(test)]
mod loop_locals_in_scope {
    use super::*;

    #[test]
    fn should_resolve_item_local_through_unnamed_loop_index() {
        let mut f = Fixture::new();
        let source = f.parameter_access("items");
        let for_loop = f.add_loop(source, LoopParent::ResourceDeclaration);
        let item = f.local("item", LocalKind::Item, for_loop);
        let syntax = f.access("item", item);

        assert_eq!(
            convert_to_string(&f.model, &syntax),
            "[parameters('items')[copyIndex()]]"
        );
    }

    #[test]
    fn should_resolve_index_local_through_named_loop_index() {
        let mut f = Fixture::new();
        let source = f.parameter_access("vals");
        let for_loop = f.add_loop(source, LoopParent::VariableDeclaration("vals".to_string()));
        let index_local = f.local("i", LocalKind::Index, for_loop);
        let syntax = f.access("i", index_local);

        assert_eq!(convert_to_string(&f.model, &syntax), "[copyIndex('vals')]");
    }

    #[test]
    fn should_name_loop_index_after_property_for_property_loops() {
        let mut f = Fixture::new();
        let source = f.parameter_access("rules");
        let for_loop = f.add_loop(source, LoopParent::Property("securityRules".to_string()));
        let index_local = f.local("i", LocalKind::Index, for_loop);
        let syntax = f.access("i", index_local);

        assert_eq!(
            convert_to_string(&f.model, &syntax),
            "[copyIndex('securityRules')]"
        );
    }
}

#[cfg(test)]
mod ancestor_names {
    use super::*;

    #[test]
    fn should_compose_parent_and_child_id_segments() {
        let mut f = Fixture::new();
        let parent_name = f.string("p");
        let parent = f.declared_resource("parent", "My.Rp/parents", "2023-01-01", parent_name);

        let child_name = f.string("c");
        let child =
            f.declared_resource("child", "My.Rp/parents/children", "2023-01-01", child_name);
        f.model.set_ancestors(
            child,
            vec![ResourceAncestor {
                resource: parent,
                index_expression: None,
            }],
        );

        let base = f.resource_access("child", child);
        let syntax = f.property_access(base, "id");

        assert_eq!(
            convert_to_string(&f.model, &syntax),
            "[resourceId('My.Rp/parents/children', 'p', 'c')]"
        );
    }

    #[test]
    fn should_use_declared_name_directly_without_ancestors() {
        let mut f = Fixture::new();
        let name = f.string("w1");
        let resource = f.declared_resource("widget", "My.Rp/widgets", "2023-01-01", name);

        let context = EmitterContext::new(&f.model, EmitterSettings::default());
        let converter = ExpressionConverter::new(&context);
        let name = converter.get_fully_qualified_resource_name(resource).unwrap();

        assert_eq!(serialize(&name), "w1");
    }

    #[test]
    fn should_join_segments_for_fully_qualified_names() {
        let mut f = Fixture::new();
        let parent_name = f.string("p");
        let parent = f.declared_resource("parent", "My.Rp/parents", "2023-01-01", parent_name);

        let child_name = f.string("c");
        let child =
            f.declared_resource("child", "My.Rp/parents/children", "2023-01-01", child_name);
        f.model.set_ancestors(
            child,
            vec![ResourceAncestor {
                resource: parent,
                index_expression: None,
            }],
        );

        let context = EmitterContext::new(&f.model, EmitterSettings::default());
        let converter = ExpressionConverter::new(&context);
        let name = converter.get_fully_qualified_resource_name(child).unwrap();

        assert_eq!(serialize(&name), "[format('{0}/{1}', 'p', 'c')]");
    }

    #[test]
    fn should_rewrite_looped_parent_name_through_ancestor_index() {
        let mut f = Fixture::new();
        let source = f.parameter_access("items");
        let for_loop = f.add_loop(source, LoopParent::ResourceDeclaration);
        let item = f.local("item", LocalKind::Item, for_loop);

        let parent_name = f.access("item", item);
        let parent = f.declared_collection("parents", "My.Rp/parents", "2023-01-01", parent_name);

        let child_name = f.string("c");
        let child =
            f.declared_resource("child", "My.Rp/parents/children", "2023-01-01", child_name);
        let ancestor_index = f.int(3);
        f.model.set_ancestors(
            child,
            vec![ResourceAncestor {
                resource: parent,
                index_expression: Some(ancestor_index),
            }],
        );

        let base = f.resource_access("child", child);
        let syntax = f.property_access(base, "id");

        assert_eq!(
            convert_to_string(&f.model, &syntax),
            "[resourceId('My.Rp/parents/children', parameters('items')[3], 'c')]"
        );
    }

    #[test]
    fn should_fail_when_looped_parent_has_no_ancestor_index() {
        let mut f = Fixture::new();
        let source = f.parameter_access("items");
        let for_loop = f.add_loop(source, LoopParent::ResourceDeclaration);
        let item = f.local("item", LocalKind::Item, for_loop);

        let parent_name = f.access("item", item);
        let parent = f.declared_collection("parents", "My.Rp/parents", "2023-01-01", parent_name);

        let child_name = f.string("c");
        let child =
            f.declared_resource("child", "My.Rp/parents/children", "2023-01-01", child_name);
        f.model.set_ancestors(
            child,
            vec![ResourceAncestor {
                resource: parent,
                index_expression: None,
            }],
        );

        let base = f.resource_access("child", child);
        let syntax = f.property_access(base, "id");

        assert!(matches!(
            try_convert(&f.model, &syntax).unwrap_err(),
            EmitError::AmbiguousIndexReplacement
        ));
    }
}

#[cfg(test)]
mod module_collections {
    use super::*;

    #[test]
    fn should_index_module_collection_outputs() {
        let mut f = Fixture::new();
        let source = f.parameter_access("regions");
        let for_loop = f.add_loop(source, LoopParent::ModuleDeclaration);
        let index_local = f.local("i", LocalKind::Index, for_loop);

        let index_access = f.access("i", index_local);
        let name = f.interpolated(&["deploy-", ""], vec![index_access]);
        let module = f.module("deployments", name, true);

        let base = f.module_access("deployments", module);
        let index = f.int(1);
        let element = f.array_access(base, index);
        let outputs = f.property_access(element, "outputs");
        let syntax = f.property_access(outputs, "endpoint");

        assert_eq!(
            convert_to_string(&f.model, &syntax),
            "[reference(resourceId('Microsoft.Resources/deployments', format('deploy-{0}', 1))).outputs.endpoint.value]"
        );
    }

    #[test]
    fn should_index_module_collection_name_access() {
        let mut f = Fixture::new();
        let source = f.parameter_access("regions");
        let for_loop = f.add_loop(source, LoopParent::ModuleDeclaration);
        let index_local = f.local("i", LocalKind::Index, for_loop);

        let index_access = f.access("i", index_local);
        let name = f.interpolated(&["deploy-", ""], vec![index_access]);
        let module = f.module("deployments", name, true);

        let base = f.module_access("deployments", module);
        let index = f.int(2);
        let element = f.array_access(base, index);
        let syntax = f.property_access(element, "name");

        assert_eq!(
            convert_to_string(&f.model, &syntax),
            "[format('deploy-{0}', 2)]"
        );
    }
}
