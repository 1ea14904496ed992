/// Geometric cooling from `hot` to `cold` over a fixed number of outer
/// cycles. Monotone nonincreasing; a single-cycle schedule runs entirely at
/// the cold end.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CoolingSchedule {
    hot: f64,
    cold: f64,
    cycles: usize,
}

impl CoolingSchedule {
    pub fn new(hot: f64, cold: f64, cycles: usize) -> Self {
        Self { hot, cold, cycles }
    }

    pub fn temperature(&self, cycle: usize) -> f64 {
        if self.cycles <= 1 {
            return self.cold;
        }
        let t = cycle as f64 / (self.cycles - 1) as f64;
        self.hot * (self.cold / self.hot).powf(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_hit_hot_and_cold_exactly() {
        let schedule = CoolingSchedule::new(100.0, 0.5, 10);
        assert!((schedule.temperature(0) - 100.0).abs() < 1e-9);
        assert!((schedule.temperature(9) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn temperatures_are_monotone_nonincreasing() {
        let schedule = CoolingSchedule::new(50.0, 0.3, 25);
        let mut previous = f64::INFINITY;
        for cycle in 0..25 {
            let t = schedule.temperature(cycle);
            assert!(t <= previous);
            assert!(t > 0.0);
            previous = t;
        }
    }

    #[test]
    fn single_cycle_runs_cold() {
        let schedule = CoolingSchedule::new(100.0, 0.3, 1);
        assert_eq!(schedule.temperature(0), 0.3);
    }

    #[test]
    fn flat_range_stays_constant() {
        let schedule = CoolingSchedule::new(2.0, 2.0, 5);
        for cycle in 0..5 {
            assert!((schedule.temperature(cycle) - 2.0).abs() < 1e-12);
        }
    }
}
