use std::any::Any;
use std::sync::Arc;
use std::thread;

use nova_proxy::{
    build_surrogate, default_interceptor, ClassNode, DefaultMethodHandler, HandlerRegistry,
    HierarchyLoader, MethodHandler, MethodRecord, PersistedSurrogate, Proceed, ProxyClassRegistry,
    ProxyError, ProxyId, ProxyInstance, RegisteredProxy, StaticClassProvider, Value,
};
use pretty_assertions::assert_eq;

const PROXY_CLASS: &str = "shop.Cart_$$_proxy";

struct Registered {
    class: ClassNode,
    id: ProxyId,
}

impl RegisteredProxy for Registered {
    fn proxy_id(&self) -> ProxyId {
        self.id
    }
}

impl ProxyInstance for Registered {
    fn proxy_class(&self) -> ClassNode {
        self.class.clone()
    }

    fn as_registered_proxy(&self) -> Option<&dyn RegisteredProxy> {
        Some(self)
    }
}

fn loader() -> HierarchyLoader {
    let provider: StaticClassProvider = serde_json::from_value(serde_json::json!({
        "classes": [
            { "name": "shop.Cart", "methods": [{ "name": "total", "returns": "long" }] },
            { "name": PROXY_CLASS, "superclass": "shop.Cart" }
        ]
    }))
    .unwrap();
    HierarchyLoader::new(Arc::new(provider))
}

fn registered_instance(loader: &mut HierarchyLoader, registry: &ProxyClassRegistry) -> Registered {
    registry.register_class(PROXY_CLASS, "1:total");
    Registered {
        class: loader.ensure_class(PROXY_CLASS).unwrap(),
        id: registry.register_instance(default_interceptor()),
    }
}

#[test]
fn registry_lookup_supplies_the_handler() {
    let mut loader = loader();
    let registry = ProxyClassRegistry::new();
    let instance = registered_instance(&mut loader, &registry);

    let surrogate = build_surrogate(&registry, &instance).unwrap();
    assert_eq!(surrogate.class().name(), PROXY_CLASS);
    assert_eq!(surrogate.filter_signature(), "1:total");
    assert!(Arc::ptr_eq(surrogate.handler().unwrap(), &default_interceptor()));
}

#[test]
fn unregistered_instance_yields_no_handler() {
    let mut loader = loader();
    let registry = ProxyClassRegistry::new();
    let instance = registered_instance(&mut loader, &registry);
    registry.unregister_instance(instance.id);

    let surrogate = build_surrogate(&registry, &instance).unwrap();
    assert!(surrogate.handler().is_none());
    assert_eq!(surrogate.persist().unwrap().handler, None);
}

struct Audit;

impl MethodHandler for Audit {
    fn invoke(
        &self,
        receiver: &dyn Any,
        _method: &MethodRecord,
        proceed: Proceed<'_>,
        args: Vec<Value>,
    ) -> anyhow::Result<Value> {
        proceed(receiver, args)
    }
}

#[test]
fn replaced_handler_is_picked_up_by_later_builds() {
    let mut loader = loader();
    let registry = ProxyClassRegistry::new();
    let instance = registered_instance(&mut loader, &registry);
    let before = build_surrogate(&registry, &instance).unwrap();

    let audit: Arc<dyn MethodHandler> = Arc::new(Audit);
    registry.set_handler(instance.id, Arc::clone(&audit));

    let after = build_surrogate(&registry, &instance).unwrap();
    assert!(Arc::ptr_eq(after.handler().unwrap(), &audit));
    assert!(after != before);
    assert!(matches!(
        after.persist(),
        Err(ProxyError::UnpersistableHandler { class }) if class == PROXY_CLASS
    ));
    assert!(before.persist().is_ok());
}

#[test]
fn repeated_builds_are_equal() {
    let mut loader = loader();
    let registry = Arc::new(ProxyClassRegistry::new());
    let instance = Arc::new(registered_instance(&mut loader, &registry));

    let first = build_surrogate(registry.as_ref(), instance.as_ref()).unwrap();
    let second = build_surrogate(registry.as_ref(), instance.as_ref()).unwrap();
    assert_eq!(first, second);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let instance = Arc::clone(&instance);
            thread::spawn(move || {
                build_surrogate(registry.as_ref(), instance.as_ref())
                    .unwrap()
                    .persist()
                    .unwrap()
            })
        })
        .collect();
    let expected = first.persist().unwrap();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
}

#[test]
fn persisted_form_round_trips_and_restores() {
    let mut loader = loader();
    let registry = ProxyClassRegistry::new();
    let instance = registered_instance(&mut loader, &registry);
    let surrogate = build_surrogate(&registry, &instance).unwrap();

    let persisted = surrogate.persist().unwrap();
    assert_eq!(
        persisted,
        PersistedSurrogate {
            class: PROXY_CLASS.to_string(),
            filter_signature: "1:total".to_string(),
            handler: Some(DefaultMethodHandler::KEY.to_string()),
        }
    );

    let bytes = persisted.to_bytes().unwrap();
    // The class name is the first field on the wire.
    assert_eq!(&bytes[..8], &(PROXY_CLASS.len() as u64).to_le_bytes());
    assert_eq!(&bytes[8..8 + PROXY_CLASS.len()], PROXY_CLASS.as_bytes());

    let decoded = PersistedSurrogate::from_bytes(&bytes).unwrap();
    let mut fresh_loader = self::loader();
    let restored = decoded
        .restore(&mut fresh_loader, &HandlerRegistry::new())
        .unwrap();
    assert_eq!(restored, surrogate);
    assert_eq!(
        restored.class().superclass().map(ClassNode::name),
        Some("shop.Cart")
    );
}

#[test]
fn restore_rejects_unknown_handlers_and_classes() {
    let unknown_handler = PersistedSurrogate {
        class: PROXY_CLASS.to_string(),
        filter_signature: String::new(),
        handler: Some("custom.audit".to_string()),
    };
    assert!(matches!(
        unknown_handler.restore(&mut loader(), &HandlerRegistry::new()),
        Err(ProxyError::UnknownHandler { key }) if key == "custom.audit"
    ));

    let unknown_class = PersistedSurrogate {
        class: "shop.Gone_$$_proxy".to_string(),
        filter_signature: String::new(),
        handler: None,
    };
    assert!(matches!(
        unknown_class.restore(&mut loader(), &HandlerRegistry::new()),
        Err(ProxyError::UnknownClass { .. })
    ));

    assert!(matches!(
        PersistedSurrogate::from_bytes(&[1, 2, 3]),
        Err(ProxyError::Bincode(_))
    ));
}
