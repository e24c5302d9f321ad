use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use trellis_di::binding::{FactoryStrategy, Lifecycle, StrategyPtr};
use trellis_di::context::DependencyContext;
use trellis_di::error::ComponentError;
use trellis_di::instance::{ComponentInstanceAnyPtr, ComponentInstancePtr};
use trellis_di::introspect::{
    FieldView, MethodView, ParameterView, ResolvedValue, StaticIntrospector, TypeView,
};
use trellis_di::key::{ComponentKey, ScopeId, TypeInfo};
use trellis_di::processor::{ComponentProcessor, ProcessorPhase};
use trellis_di::provider::{ComponentAccessor, ProviderRegistry};
use trellis_di::proxy::{ProxyFactory, ProxyProcessor};

struct AuditLog;

#[derive(Default)]
struct Service {
    audit: Mutex<Option<ComponentInstanceAnyPtr>>,
    configured: Mutex<Vec<Option<ResolvedValue>>>,
}

fn counting(counter: Arc<AtomicUsize>, lifecycle: Lifecycle) -> StrategyPtr {
    Arc::new(FactoryStrategy::new(lifecycle, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(ComponentInstancePtr::new(0) as ComponentInstanceAnyPtr)
    }))
}

fn service_strategy() -> StrategyPtr {
    Arc::new(FactoryStrategy::transient(|_| {
        Ok(ComponentInstancePtr::new(Service::default()) as ComponentInstanceAnyPtr)
    }))
}

fn as_service(instance: &ComponentInstanceAnyPtr) -> Arc<Service> {
    instance
        .clone()
        .downcast::<Service>()
        .unwrap_or_else(|_| panic!("populated instance should be a service"))
}

fn audit_field(key: ComponentKey) -> FieldView {
    FieldView::new("audit", key, |instance, value| {
        if let ResolvedValue::Instance(value) = value {
            *as_service(instance).audit.lock().unwrap() = Some(value);
        }

        Ok(())
    })
}

#[test]
fn should_detect_dependency_cycles_without_hanging() {
    let registry = ProviderRegistry::builder().build();
    let service = ComponentKey::of::<Service>();
    let audit = ComponentKey::of::<AuditLog>();

    let audit_dependency = audit.clone();
    registry.binder().bind(
        &service,
        Arc::new(FactoryStrategy::transient(move |accessor| {
            accessor.get(&audit_dependency)
        })),
    );
    let service_dependency = service.clone();
    registry.binder().bind(
        &audit,
        Arc::new(FactoryStrategy::transient(move |accessor| {
            accessor.get(&service_dependency)
        })),
    );

    let provider = registry.provider(&ScopeId::Default);
    match provider.get(&service).unwrap_err() {
        ComponentError::Cycle(error) => {
            assert_eq!(error.key, service);
            assert_eq!(error.implicated, Some(audit));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn should_cache_singletons_per_scope() {
    let registry = ProviderRegistry::builder().build();
    let key = ComponentKey::of::<Service>();
    let counter = Arc::new(AtomicUsize::new(0));
    registry
        .binder()
        .bind(&key, counting(counter.clone(), Lifecycle::Singleton));

    let provider = registry.provider(&ScopeId::Default);
    let first = provider.get(&key).unwrap();
    let second = provider.get(&key).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(counter.load(Ordering::SeqCst), 1);

    // an isolated scope constructs independently
    let other = registry.provider(&ScopeId::named("request"));
    let third = other.get(&key).unwrap();

    assert!(!Arc::ptr_eq(&first, &third));
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[test]
fn should_defer_lazy_singletons_until_first_access() {
    let registry = ProviderRegistry::builder().build();
    let key = ComponentKey::of::<Service>();
    let counter = Arc::new(AtomicUsize::new(0));
    registry
        .binder()
        .bind(&key, counting(counter.clone(), Lifecycle::LazySingleton));

    let provider = registry.provider(&ScopeId::Default);
    assert_eq!(counter.load(Ordering::SeqCst), 0);

    provider.get(&key).unwrap();
    provider.get(&key).unwrap();
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn should_escalate_missing_required_fields() {
    let audit_key = ComponentKey::of::<AuditLog>();
    let introspector = StaticIntrospector::new().with_view(
        TypeView::builder(TypeInfo::of::<Service>())
            .field(audit_field(audit_key))
            .build(),
    );

    let registry = ProviderRegistry::builder()
        .with_introspector(Arc::new(introspector))
        .build();
    let service = ComponentKey::of::<Service>();
    registry.binder().bind(&service, service_strategy());

    let provider = registry.provider(&ScopeId::Default);
    match provider.get(&service).unwrap_err() {
        ComponentError::Required(error) => {
            assert_eq!(error.member, "audit");
            assert_eq!(error.owner, TypeInfo::of::<Service>());
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn should_leave_missing_optional_fields_unset() {
    let audit_key = ComponentKey::of::<AuditLog>();
    let introspector = StaticIntrospector::new().with_view(
        TypeView::builder(TypeInfo::of::<Service>())
            .field(audit_field(audit_key).optional())
            .build(),
    );

    let registry = ProviderRegistry::builder()
        .with_introspector(Arc::new(introspector))
        .build();
    let service = ComponentKey::of::<Service>();
    registry.binder().bind(&service, service_strategy());

    let provider = registry.provider(&ScopeId::Default);
    let instance = provider.get_typed::<Service>(&service).unwrap();
    assert!(instance.audit.lock().unwrap().is_none());
}

#[test]
fn should_populate_bound_fields_and_context_objects() {
    let audit_key = ComponentKey::of::<AuditLog>();
    let context_field = FieldView::new(
        "context",
        ComponentKey::of::<String>(),
        |instance, value| {
            if let ResolvedValue::Instance(value) = value {
                as_service(instance)
                    .configured
                    .lock()
                    .unwrap()
                    .push(Some(ResolvedValue::Instance(value)));
            }

            Ok(())
        },
    )
    .from_context();

    let introspector = StaticIntrospector::new().with_view(
        TypeView::builder(TypeInfo::of::<Service>())
            .field(audit_field(audit_key.clone()))
            .field(context_field)
            .build(),
    );

    let registry = ProviderRegistry::builder()
        .with_introspector(Arc::new(introspector))
        .build();
    let service = ComponentKey::of::<Service>();
    registry.binder().bind(&service, service_strategy());
    registry.binder().bind(
        &audit_key,
        Arc::new(FactoryStrategy::singleton(|_| {
            Ok(ComponentInstancePtr::new(AuditLog) as ComponentInstanceAnyPtr)
        })),
    );
    registry.contexts().register(
        TypeInfo::of::<String>(),
        None,
        ComponentInstancePtr::new("application context".to_string()) as ComponentInstanceAnyPtr,
    );

    let provider = registry.provider(&ScopeId::Default);
    let instance = provider.get_typed::<Service>(&service).unwrap();

    assert!(instance.audit.lock().unwrap().is_some());
    assert_eq!(instance.configured.lock().unwrap().len(), 1);
}

#[test]
fn should_invoke_methods_with_optional_parameters_missing() {
    let audit_key = ComponentKey::of::<AuditLog>();
    let unbound = ComponentKey::builder::<AuditLog>().name("secondary").build();

    let configure = MethodView::new(
        "configure",
        vec![
            ParameterView::new(audit_key.clone()),
            ParameterView::new(unbound).optional(),
        ],
        |instance, values| {
            *as_service(instance).configured.lock().unwrap() = values;

            Ok(())
        },
    );

    let introspector = StaticIntrospector::new().with_view(
        TypeView::builder(TypeInfo::of::<Service>())
            .method(configure)
            .build(),
    );

    let registry = ProviderRegistry::builder()
        .with_introspector(Arc::new(introspector))
        .build();
    let service = ComponentKey::of::<Service>();
    registry.binder().bind(&service, service_strategy());
    registry.binder().bind(
        &audit_key,
        Arc::new(FactoryStrategy::singleton(|_| {
            Ok(ComponentInstancePtr::new(AuditLog) as ComponentInstanceAnyPtr)
        })),
    );

    let provider = registry.provider(&ScopeId::Default);
    let instance = provider.get_typed::<Service>(&service).unwrap();

    let parameters = instance.configured.lock().unwrap();
    assert_eq!(parameters.len(), 2);
    assert!(parameters[0].is_some());
    assert!(parameters[1].is_none());
}

struct TagProcessor {
    tag: &'static str,
}

impl ComponentProcessor for TagProcessor {
    fn process(
        &self,
        _key: &ComponentKey,
        instance: ComponentInstanceAnyPtr,
        _accessor: &mut ComponentAccessor<'_>,
    ) -> Result<ComponentInstanceAnyPtr, ComponentError> {
        let value = instance
            .downcast::<String>()
            .unwrap_or_else(|_| panic!("processed instance should be a string"));

        Ok(ComponentInstancePtr::new(format!("{value}>{}", self.tag)) as ComponentInstanceAnyPtr)
    }
}

#[test]
fn should_run_processors_in_ascending_priority_order() {
    let registry = ProviderRegistry::builder().build();
    let key = ComponentKey::of::<String>();
    registry.binder().bind(
        &key,
        Arc::new(FactoryStrategy::transient(|_| {
            Ok(ComponentInstancePtr::new("raw".to_string()) as ComponentInstanceAnyPtr)
        })),
    );

    registry.processors().register(
        ProcessorPhase::Pre,
        20,
        Arc::new(TagProcessor { tag: "pre-late" }),
    );
    registry.processors().register(
        ProcessorPhase::Pre,
        10,
        Arc::new(TagProcessor { tag: "pre-early" }),
    );
    registry.processors().register(
        ProcessorPhase::Post,
        0,
        Arc::new(TagProcessor { tag: "post" }),
    );

    let provider = registry.provider(&ScopeId::Default);
    let value = provider.get_typed::<String>(&key).unwrap();

    assert_eq!(*value, "raw>pre-early>pre-late>post");
}

struct WrappingProxyFactory;

impl ProxyFactory for WrappingProxyFactory {
    fn proxy(
        &self,
        _key: &ComponentKey,
        target: ComponentInstanceAnyPtr,
    ) -> Result<ComponentInstanceAnyPtr, ComponentError> {
        let value = target
            .downcast::<String>()
            .unwrap_or_else(|_| panic!("proxied instance should be a string"));

        Ok(ComponentInstancePtr::new(format!("proxy({value})")) as ComponentInstanceAnyPtr)
    }
}

#[test]
fn should_let_post_processors_replace_the_returned_instance() {
    let registry = ProviderRegistry::builder().build();
    let key = ComponentKey::of::<String>();
    registry.binder().bind(
        &key,
        Arc::new(FactoryStrategy::transient(|_| {
            Ok(ComponentInstancePtr::new("target".to_string()) as ComponentInstanceAnyPtr)
        })),
    );

    registry.processors().register(
        ProcessorPhase::Post,
        0,
        Arc::new(ProxyProcessor::new(Arc::new(WrappingProxyFactory))),
    );

    let provider = registry.provider(&ScopeId::Default);
    let value = provider.get_typed::<String>(&key).unwrap();

    assert_eq!(*value, "proxy(target)");
}

#[test]
fn should_see_rebound_strategies_on_subsequent_requests() {
    let registry = ProviderRegistry::builder().build();
    let key = ComponentKey::of::<Service>();

    registry.binder().bind_constant(
        &key,
        ComponentInstancePtr::new(1i32) as ComponentInstanceAnyPtr,
    );
    let provider = registry.provider(&ScopeId::Default);
    assert_eq!(*provider.get_typed::<i32>(&key).unwrap(), 1);

    registry.binder().bind_at(
        &key,
        1,
        Arc::new(FactoryStrategy::transient(|_| {
            Ok(ComponentInstancePtr::new(2i32) as ComponentInstanceAnyPtr)
        })),
    );
    assert_eq!(*provider.get_typed::<i32>(&key).unwrap(), 2);
}

#[test]
fn should_warm_up_eager_singletons_only() {
    let registry = ProviderRegistry::builder().build();
    let eager_key = ComponentKey::of::<Service>();
    let lazy_key = ComponentKey::of::<AuditLog>();
    let eager_count = Arc::new(AtomicUsize::new(0));
    let lazy_count = Arc::new(AtomicUsize::new(0));

    registry
        .binder()
        .bind(&eager_key, counting(eager_count.clone(), Lifecycle::Singleton));
    registry
        .binder()
        .bind(&lazy_key, counting(lazy_count.clone(), Lifecycle::LazySingleton));

    registry.declarations().declare(
        DependencyContext::builder(eager_key, service_strategy()).build(),
    );
    registry.declarations().declare(
        DependencyContext::builder(lazy_key.clone(), service_strategy()).build(),
    );

    registry.warm_up().unwrap();
    assert_eq!(eager_count.load(Ordering::SeqCst), 1);
    assert_eq!(lazy_count.load(Ordering::SeqCst), 0);

    let provider = registry.provider(&ScopeId::Default);
    provider.get(&lazy_key).unwrap();
    provider.get(&lazy_key).unwrap();
    assert_eq!(lazy_count.load(Ordering::SeqCst), 1);
}
