use super::handler::{EventHandler, HandledEventType};
use dashmap::DashMap;
use std::sync::Arc;

/// 事件类型 → 处理器 的路由表
///
/// 支持运行期注册；同一事件类型下同名处理器只保留最后一次注册。
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    by_type: Arc<DashMap<String, Vec<Arc<dyn EventHandler>>>>,
    all: Arc<DashMap<String, Arc<dyn EventHandler>>>,
}

impl HandlerRegistry {
    pub fn new(handlers: Vec<Arc<dyn EventHandler>>) -> Self {
        let registry = Self::default();
        for h in handlers {
            registry.register(h);
        }
        registry
    }

    pub fn register(&self, handler: Arc<dyn EventHandler>) {
        match handler.handled_event_type() {
            HandledEventType::All => {
                self.all
                    .insert(handler.handler_name().to_string(), handler);
            }
            HandledEventType::One(t) => self.bind(t, handler),
            HandledEventType::Many(ts) => {
                for t in ts {
                    self.bind(t, handler.clone());
                }
            }
        }
    }

    fn bind(&self, event_type: String, handler: Arc<dyn EventHandler>) {
        let mut list = self.by_type.entry(event_type).or_default();
        list.retain(|h| h.handler_name() != handler.handler_name());
        list.push(handler);
    }

    /// 匹配某事件类型的全部处理器（返回快照，不持有内部锁）
    pub fn matching(&self, event_type: &str) -> Vec<Arc<dyn EventHandler>> {
        let mut merged: Vec<Arc<dyn EventHandler>> = Vec::new();
        if let Some(list) = self.by_type.get(event_type) {
            merged.extend(list.iter().cloned());
        }
        merged.extend(self.all.iter().map(|e| e.value().clone()));
        merged
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty() && self.all.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain_event::EventEnvelope;
    use async_trait::async_trait;

    struct Named {
        name: &'static str,
        types: HandledEventType,
    }

    #[async_trait]
    impl EventHandler for Named {
        fn handler_name(&self) -> &str {
            self.name
        }
        fn handled_event_type(&self) -> HandledEventType {
            self.types.clone()
        }
        async fn handle(&self, _event: &EventEnvelope) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn names(list: &[Arc<dyn EventHandler>]) -> Vec<String> {
        let mut names: Vec<String> = list.iter().map(|h| h.handler_name().to_string()).collect();
        names.sort();
        names
    }

    #[test]
    fn routes_by_type_and_all() {
        let registry = HandlerRegistry::new(vec![
            Arc::new(Named {
                name: "one",
                types: HandledEventType::One("a".into()),
            }) as Arc<dyn EventHandler>,
            Arc::new(Named {
                name: "many",
                types: HandledEventType::Many(vec!["a".into(), "b".into()]),
            }) as Arc<dyn EventHandler>,
            Arc::new(Named {
                name: "audit",
                types: HandledEventType::All,
            }) as Arc<dyn EventHandler>,
        ]);

        assert_eq!(names(&registry.matching("a")), ["audit", "many", "one"]);
        assert_eq!(names(&registry.matching("b")), ["audit", "many"]);
        assert_eq!(names(&registry.matching("c")), ["audit"]);
    }

    #[test]
    fn re_registering_replaces_same_name() {
        let registry = HandlerRegistry::default();
        assert!(registry.is_empty());

        for _ in 0..3 {
            registry.register(Arc::new(Named {
                name: "one",
                types: HandledEventType::One("a".into()),
            }));
        }
        assert_eq!(registry.matching("a").len(), 1);
    }
}
