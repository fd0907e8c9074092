// Copyright (c) 2020 kprotty
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// 	http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use core::hint::spin_loop;

/// Bounded exponential backoff performed before a thread parks itself.
#[derive(Copy, Clone, Debug, Default)]
pub struct Spin {
    iter: usize,
}

impl Spin {
    const MAX_ITER: usize = 10;

    pub fn new() -> Self {
        Self { iter: 0 }
    }

    pub fn reset(&mut self) {
        self.iter = 0;
    }

    pub fn yield_now(&mut self) -> bool {
        if self.iter > Self::MAX_ITER {
            false
        } else {
            (0..(1 << self.iter)).for_each(|_| spin_loop());
            self.iter += 1;
            true
        }
    }
}
