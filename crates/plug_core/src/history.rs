//! Histórico limitado, compartilhado entre a thread de rede e os consumidores.
//!
//! Toda mutação e toda leitura acontecem sob um único [`Mutex`]; leituras
//! devolvem cópias, então o produtor nunca espera mais que uma cópia.

use crate::config::HistoryConfig;
use crate::types::{AutoCalEvent, DeviceRecognition, PowerReading};
use parking_lot::Mutex;
use std::collections::VecDeque;

/// FIFO de capacidade fixa: inserir com o buffer cheio descarta o mais antigo.
#[derive(Debug, Clone)]
pub struct HistoryBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T: Clone> HistoryBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Insere no fim; devolve o item descartado, se houver.
    pub fn push(&mut self, item: T) -> Option<T> {
        if self.capacity == 0 {
            return Some(item);
        }
        let evicted = if self.items.len() >= self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn last(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    /// Cópia em ordem de chegada.
    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

#[derive(Debug)]
struct Buffers {
    readings: HistoryBuffer<PowerReading>,
    auto_cal_events: HistoryBuffer<AutoCalEvent>,
    recognitions: HistoryBuffer<DeviceRecognition>,
}

/// Buffers de leituras, eventos de auto-calibração e reconhecimentos.
#[derive(Debug)]
pub struct HistoryStore {
    inner: Mutex<Buffers>,
}

impl HistoryStore {
    pub fn new(config: &HistoryConfig) -> Self {
        Self {
            inner: Mutex::new(Buffers {
                readings: HistoryBuffer::new(config.readings),
                auto_cal_events: HistoryBuffer::new(config.auto_cal_events),
                recognitions: HistoryBuffer::new(config.device_recognitions),
            }),
        }
    }

    pub fn push_reading(&self, reading: PowerReading) {
        self.inner.lock().readings.push(reading);
    }

    pub fn push_auto_cal_event(&self, event: AutoCalEvent) {
        self.inner.lock().auto_cal_events.push(event);
    }

    pub fn push_recognition(&self, recognition: DeviceRecognition) {
        self.inner.lock().recognitions.push(recognition);
    }

    /// Cópia das leituras como `(timestamps, valores)`.
    pub fn snapshot(&self) -> (Vec<f64>, Vec<f64>) {
        let guard = self.inner.lock();
        guard
            .readings
            .iter()
            .map(|r| (r.timestamp, r.value))
            .unzip()
    }

    pub fn readings(&self) -> Vec<PowerReading> {
        self.inner.lock().readings.to_vec()
    }

    pub fn latest_reading(&self) -> Option<PowerReading> {
        self.inner.lock().readings.last().copied()
    }

    pub fn auto_cal_events(&self) -> Vec<AutoCalEvent> {
        self.inner.lock().auto_cal_events.to_vec()
    }

    pub fn recognitions(&self) -> Vec<DeviceRecognition> {
        self.inner.lock().recognitions.to_vec()
    }

    pub fn reading_count(&self) -> usize {
        self.inner.lock().readings.len()
    }

    /// Esvazia todos os buffers de uma vez. Devolve quantas leituras havia.
    pub fn clear(&self) -> usize {
        let mut guard = self.inner.lock();
        let count = guard.readings.len();
        guard.readings.clear();
        guard.auto_cal_events.clear();
        guard.recognitions.clear();
        count
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(&HistoryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AutoCalEventKind, Stats};
    use std::sync::Arc;

    #[test]
    fn fifo_evicts_oldest() {
        let mut buf = HistoryBuffer::new(3);
        for i in 0..4 {
            buf.push(i);
        }
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.to_vec(), vec![1, 2, 3]);
    }

    #[test]
    fn push_reports_evicted_item() {
        let mut buf = HistoryBuffer::new(1);
        assert_eq!(buf.push('a'), None);
        assert_eq!(buf.push('b'), Some('a'));
    }

    #[test]
    fn zero_capacity_stays_empty() {
        let mut buf = HistoryBuffer::new(0);
        buf.push(1);
        assert!(buf.is_empty());
    }

    #[test]
    fn store_snapshot_is_a_copy() {
        let store = HistoryStore::new(&HistoryConfig {
            readings: 2,
            ..Default::default()
        });
        store.push_reading(PowerReading::new(1.0, 10.0));
        store.push_reading(PowerReading::new(2.0, 20.0));
        store.push_reading(PowerReading::new(3.0, 30.0));

        let (ts, values) = store.snapshot();
        assert_eq!(ts, vec![2.0, 3.0]);
        assert_eq!(values, vec![20.0, 30.0]);

        store.push_reading(PowerReading::new(4.0, 40.0));
        assert_eq!(values, vec![20.0, 30.0]);
        assert_eq!(store.latest_reading().map(|r| r.value), Some(40.0));
    }

    #[test]
    fn clear_empties_everything() {
        let store = HistoryStore::default();
        store.push_reading(PowerReading::new(1.0, 10.0));
        store.push_auto_cal_event(AutoCalEvent::now(AutoCalEventKind::ZeroCalibration, Stats::new()));
        store.push_recognition(DeviceRecognition {
            timestamp: 1.0,
            current_amps: 5.0,
            device_info: "NAME=Kettle".into(),
        });
        assert_eq!(store.clear(), 1);
        assert_eq!(store.reading_count(), 0);
        assert!(store.auto_cal_events().is_empty());
        assert!(store.recognitions().is_empty());
    }

    #[test]
    fn concurrent_producer_keeps_order_and_bound() {
        let store = Arc::new(HistoryStore::new(&HistoryConfig {
            readings: 50,
            ..Default::default()
        }));
        let producer = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for i in 0..1000 {
                    store.push_reading(PowerReading::new(i as f64, i as f64));
                }
            })
        };
        for _ in 0..200 {
            let (ts, _) = store.snapshot();
            assert!(ts.len() <= 50);
            assert!(ts.windows(2).all(|w| w[0] < w[1]));
        }
        producer.join().unwrap();
        let (ts, _) = store.snapshot();
        assert_eq!(ts.first(), Some(&950.0));
        assert_eq!(ts.last(), Some(&999.0));
    }
}
